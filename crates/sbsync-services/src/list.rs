//! Per-list state and the merge/commit cycle.
//!
//! A `SafeList` owns one blocklist: its chunk log on disk, the published
//! lookup tables, the chunk range summary, and the instructions waiting for
//! the next update. Merges are serialized by `update_lock`. Lookups never
//! take that lock; they clone the currently published `Arc<Lookup>`, which
//! is only ever replaced wholesale after a merge has been durably committed.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;

use sbsync_core::chunk::{ChunkNumbers, ChunkRecord, ChunkType, FullHash, Prefix};
use sbsync_core::ranges::encode_ranges;

use crate::error::SyncError;
use crate::log_store::LogFile;
use crate::lookup::Lookup;
use crate::merge::{merge, SyncReport};
use crate::verify_cache::VerificationCache;

/// Which chunks are held, per chunk type, as range strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChunkRanges {
    pub add: String,
    pub sub: String,
}

impl ChunkRanges {
    fn from_kept(kept: &ChunkNumbers) -> Self {
        Self {
            add: encode_ranges(kept.get(ChunkType::Add).iter().copied()),
            sub: encode_ranges(kept.get(ChunkType::Sub).iter().copied()),
        }
    }

    pub fn get(&self, chunk_type: ChunkType) -> &str {
        match chunk_type {
            ChunkType::Add => &self.add,
            ChunkType::Sub => &self.sub,
        }
    }
}

/// Point-in-time counters for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ListStats {
    pub name: String,
    pub ranges: ChunkRanges,
    pub prefixes: usize,
    pub full_hashes: usize,
    pub resolved: usize,
    pub pending_sources: usize,
    pub pending_deletions: usize,
    pub cached_verdicts: usize,
}

#[derive(Default)]
struct Pending {
    sources: VecDeque<String>,
    deletions: ChunkNumbers,
}

/// Everything a merge publishes, swapped as one value.
#[derive(Default)]
struct Published {
    lookup: Arc<Lookup>,
    ranges: ChunkRanges,
}

pub struct SafeList {
    name: String,
    log: LogFile,
    /// Held for the whole of a merge/commit cycle.
    update_lock: Mutex<()>,
    pending: Mutex<Pending>,
    published: RwLock<Published>,
    cache: VerificationCache,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SafeList {
    /// An empty list backed by `path`. Does not touch the filesystem.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, cache_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            log: LogFile::new(path),
            update_lock: Mutex::new(()),
            pending: Mutex::new(Pending::default()),
            published: RwLock::new(Published::default()),
            cache: VerificationCache::new(cache_ttl),
        }
    }

    /// Load a list from its chunk log, or start empty if there is none.
    pub fn open(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        cache_ttl: Duration,
    ) -> Result<Self, SyncError> {
        let list = Self::new(name, path, cache_ttl);
        if let Some(parent) = list.log.path().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SyncError::storage(parent, e))?;
            }
        }
        list.synchronize(&[])?;
        Ok(list)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// The currently published lookup tables. Hold on to the `Arc` to run
    /// several queries against one consistent state.
    pub fn lookup(&self) -> Arc<Lookup> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup
            .clone()
    }

    pub fn contains_prefix(&self, prefix: &Prefix) -> bool {
        self.lookup().contains_prefix(prefix)
    }

    pub fn contains_full_hash(&self, hash: &FullHash) -> bool {
        self.lookup().contains_full_hash(hash)
    }

    /// True if the hash was retracted and must not be re-verified remotely.
    pub fn is_resolved(&self, hash: &FullHash) -> bool {
        self.lookup().is_resolved(hash)
    }

    pub fn chunk_ranges(&self) -> ChunkRanges {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ranges
            .clone()
    }

    pub fn verification_cache(&self) -> &VerificationCache {
        &self.cache
    }

    pub fn stats(&self) -> ListStats {
        let (lookup, ranges) = {
            let published = self.published.read().unwrap_or_else(PoisonError::into_inner);
            (published.lookup.clone(), published.ranges.clone())
        };
        let pending = lock(&self.pending);
        ListStats {
            name: self.name.clone(),
            ranges,
            prefixes: lookup.prefixes.len(),
            full_hashes: lookup.full_hashes.len(),
            resolved: lookup.resolved.len(),
            pending_sources: pending.sources.len(),
            pending_deletions: pending.deletions.len(),
            cached_verdicts: self.cache.len(),
        }
    }

    // ── Instructions ──────────────────────────────────────────────────────────

    /// Discard the given chunk at the next synchronization.
    pub fn request_deletion(&self, chunk_type: ChunkType, number: u32) {
        if lock(&self.pending).deletions.insert(chunk_type, number) {
            tracing::debug!(list = %self.name, %chunk_type, chunk = number, "deletion requested");
        }
    }

    pub fn pending_deletions(&self) -> ChunkNumbers {
        lock(&self.pending).deletions.clone()
    }

    /// Queue a delta source for the next update cycle.
    pub fn queue_source(&self, location: impl Into<String>) {
        let location = location.into();
        tracing::debug!(list = %self.name, location = %location, "delta source queued");
        lock(&self.pending).sources.push_back(location);
    }

    pub fn pending_sources(&self) -> Vec<String> {
        lock(&self.pending).sources.iter().cloned().collect()
    }

    /// Remove the first `count` pending sources after they were applied.
    pub(crate) fn complete_sources(&self, count: usize) {
        let mut pending = lock(&self.pending);
        let count = count.min(pending.sources.len());
        pending.sources.drain(..count);
    }

    // ── Merge ─────────────────────────────────────────────────────────────────

    /// Merge `delta` into the list and publish the result.
    ///
    /// The persisted log is streamed through the merge together with the
    /// delta into a temporary file, which replaces the log by rename once
    /// complete. Only then are the new lookup tables and range summary
    /// published and the consumed deletion instructions cleared. On error
    /// nothing observable changes.
    pub fn synchronize(&self, delta: &[ChunkRecord]) -> Result<SyncReport, SyncError> {
        let guard = self.begin_update();
        self.synchronize_locked(&guard, delta)
    }

    /// Take the update lock. Held across a whole fetch-and-merge cycle.
    pub(crate) fn begin_update(&self) -> MutexGuard<'_, ()> {
        lock(&self.update_lock)
    }

    /// Body of [`SafeList::synchronize`]; the guard proves the update lock
    /// is held.
    pub(crate) fn synchronize_locked(
        &self,
        _guard: &MutexGuard<'_, ()>,
        delta: &[ChunkRecord],
    ) -> Result<SyncReport, SyncError> {
        if delta.is_empty() && !self.log.exists() {
            tracing::debug!(list = %self.name, "no chunk log and no delta, nothing to merge");
            return Ok(SyncReport::default());
        }

        tracing::info!(list = %self.name, delta = delta.len(), "reloading list");

        // Instructions that arrive while merging wait for the next cycle.
        let deletions = lock(&self.pending).deletions.clone();

        let existing = self.log.open_reader()?;
        let mut tmp = self.log.create_tmp()?;
        let outcome = merge(existing.into_iter().flatten(), delta, &deletions, tmp.writer())
            .map_err(|e| SyncError::from_merge(e, self.log.path(), self.log.tmp_path()))?;
        tmp.commit()?;

        let lookup = Arc::new(outcome.lookup);
        let ranges = ChunkRanges::from_kept(&outcome.kept);
        {
            let mut published = self.published.write().unwrap_or_else(PoisonError::into_inner);
            published.lookup = lookup.clone();
            published.ranges = ranges.clone();
        }
        lock(&self.pending).deletions.remove_all(&deletions);

        let invalidated = self.cache.invalidate_resolved(&lookup.resolved);

        let report = outcome.report;
        tracing::info!(
            list = %self.name,
            added = report.added(),
            deleted = report.deleted(),
            anomalous = report.anomalous(),
            add_ranges = %ranges.add,
            sub_ranges = %ranges.sub,
            invalidated,
            "list updated"
        );
        Ok(report)
    }
}
