//! Full-hash verification cache.
//!
//! A prefix hit has to be confirmed against the distributor's full hashes.
//! The classification layer records each confirmation here so repeated
//! lookups of the same URL stay local until the entry expires. Entries for
//! hashes the distributor has since retracted are dropped on every merge.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use sbsync_core::chunk::FullHash;

use crate::hash_set::FullHashSet;

/// Outcome of one remote verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedVerdict {
    /// True if the remote service confirmed the hash as malicious.
    pub malicious: bool,
    pub verified_at: Instant,
    pub expires_at: Instant,
}

/// Concurrent TTL cache keyed by full hash.
#[derive(Clone)]
pub struct VerificationCache {
    entries: Arc<DashMap<FullHash, CachedVerdict>>,
    ttl: Duration,
}

impl VerificationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Record a verification result, replacing any previous one.
    pub fn record(&self, hash: FullHash, malicious: bool) {
        self.record_at(hash, malicious, Instant::now());
    }

    fn record_at(&self, hash: FullHash, malicious: bool, now: Instant) {
        self.entries.insert(
            hash,
            CachedVerdict {
                malicious,
                verified_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Look up a live verdict. Expired entries are removed on access.
    pub fn get(&self, hash: &FullHash) -> Option<CachedVerdict> {
        self.get_at(hash, Instant::now())
    }

    fn get_at(&self, hash: &FullHash, now: Instant) -> Option<CachedVerdict> {
        let verdict = *self.entries.get(hash)?.value();
        if verdict.expires_at <= now {
            self.entries.remove_if(hash, |_, v| v.expires_at <= now);
            return None;
        }
        Some(verdict)
    }

    /// Drop entries for hashes that are now resolved. Returns the count.
    pub fn invalidate_resolved(&self, resolved: &FullHashSet) -> usize {
        let before = self.entries.len();
        self.entries.retain(|hash, _| !resolved.contains(hash));
        before.saturating_sub(self.entries.len())
    }

    /// Drop every expired entry. Returns the count.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, v| v.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
