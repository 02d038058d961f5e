//! Persisted chunk log files.
//!
//! Each list owns one log file. A merge streams the old log in while
//! streaming the new one out to a `.tmp` sibling, then renames the sibling
//! over the canonical path. Readers only ever open the canonical path, so
//! they see either the old log or the new one in full.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use sbsync_core::codec::{RecordReader, RecordWriter};

use crate::error::SyncError;

/// Location of a list's chunk log and its temporary sibling.
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Open the log for streaming reads. A missing log is `Ok(None)`.
    pub fn open_reader(&self) -> Result<Option<RecordReader<BufReader<File>>>, SyncError> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(RecordReader::new(BufReader::new(file)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::storage(&self.path, e)),
        }
    }

    /// Create (or truncate) the temporary sibling for a new log.
    pub fn create_tmp(&self) -> Result<TmpLog, SyncError> {
        let file =
            File::create(&self.tmp_path).map_err(|e| SyncError::storage(&self.tmp_path, e))?;
        Ok(TmpLog {
            writer: RecordWriter::new(BufWriter::new(file)),
            guard: TmpGuard {
                path: self.tmp_path.clone(),
                armed: true,
            },
            target: self.path.clone(),
        })
    }
}

/// A new log being written. Dropped without [`TmpLog::commit`], the
/// temporary file is removed and the canonical log is left alone.
pub struct TmpLog {
    // Field order matters: the writer closes the file before the guard
    // removes it.
    writer: RecordWriter<BufWriter<File>>,
    guard: TmpGuard,
    target: PathBuf,
}

impl TmpLog {
    pub fn writer(&mut self) -> &mut RecordWriter<BufWriter<File>> {
        &mut self.writer
    }

    /// Flush and fsync the new log, then atomically rename it over the
    /// canonical path.
    pub fn commit(self) -> Result<(), SyncError> {
        let TmpLog {
            writer,
            mut guard,
            target,
        } = self;
        let tmp_path = guard.path.clone();

        let mut buffered = writer.into_inner();
        buffered
            .flush()
            .map_err(|e| SyncError::storage(&tmp_path, e))?;
        let file = buffered
            .into_inner()
            .map_err(|e| SyncError::storage(&tmp_path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| SyncError::storage(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, &target).map_err(|e| SyncError::storage(&target, e))?;
        guard.armed = false;

        sync_parent_dir(&target);
        Ok(())
    }
}

struct TmpGuard {
    path: PathBuf,
    armed: bool,
}

impl Drop for TmpGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(error = %e, path = %self.path.display(), "failed to remove temporary log");
                }
            }
        }
    }
}

/// Persist the rename itself. Best-effort.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => return,
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        tracing::debug!(error = %e, dir = %parent.display(), "failed to sync log directory");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
