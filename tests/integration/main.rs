//! sbsync integration test harness.
//!
//! Tests drive `SafeList` end to end against real files in a scratch
//! directory: merge, commit, reopen, and the update cycle. Each test owns
//! its own directory, so they run in parallel.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};

use sbsync_core::chunk::{ChunkRecord, ChunkType};
use sbsync_core::codec::{encode_all, RecordReader};
use sbsync_services::SafeList;

mod concurrency;
mod scenarios;
mod updates;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const LIST: &str = "goog-malware-shavar";

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Scratch directory removed on drop.
pub struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    pub fn new(tag: &str) -> Result<Self> {
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "sbsync-it-{tag}-{}-{id}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("incoming"))
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(format!("{LIST}.dat"))
    }

    pub fn incoming(&self) -> PathBuf {
        self.dir.join("incoming")
    }

    /// Open (or reopen) the list backed by this directory.
    pub fn open(&self) -> Result<SafeList> {
        SafeList::open(LIST, self.log_path(), Duration::from_secs(300))
            .context("failed to open list")
    }

    /// Write a delta source file under `incoming/`.
    pub fn write_source(&self, name: &str, records: &[ChunkRecord]) -> Result<()> {
        std::fs::write(self.incoming().join(name), encode_all(records)?)
            .with_context(|| format!("failed to write source {name}"))
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Every record in a persisted log, in file order.
pub fn read_log(path: &Path) -> Result<Vec<ChunkRecord>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    RecordReader::new(BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .context("log is not readable")
}

pub fn add(number: u32, width: u8, hashes: &[u8]) -> ChunkRecord {
    ChunkRecord::new(ChunkType::Add, number, width, hashes.to_vec())
}

pub fn sub(number: u32, width: u8, hashes: &[u8]) -> ChunkRecord {
    ChunkRecord::new(ChunkType::Sub, number, width, hashes.to_vec())
}
