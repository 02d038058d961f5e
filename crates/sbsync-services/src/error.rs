//! Errors surfaced by list synchronization.

use std::path::PathBuf;

use sbsync_core::codec::CodecError;

use crate::merge::MergeError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A delta source could not be fetched. The source stays pending.
    #[error("failed to fetch {location}: {reason}")]
    Transport { location: String, reason: String },

    /// Malformed chunk data, either in a delta or in the persisted log.
    #[error(transparent)]
    Decode(#[from] CodecError),

    /// Open, create, write, sync or rename of a log file failed.
    #[error("storage failure on {}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Storage {
            path: path.into(),
            source,
        }
    }

    /// The error and every source below it, joined with `": "`.
    pub fn chain_message(&self) -> String {
        std::iter::successors(Some(self as &dyn std::error::Error), |e| e.source())
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(": ")
    }

    /// Attach file paths to a merge failure.
    ///
    /// I/O errors while reading the existing log are storage failures; any
    /// other read error is a decode failure.
    pub fn from_merge(err: MergeError, log_path: &std::path::Path, tmp_path: &std::path::Path) -> Self {
        match err {
            MergeError::ExistingLog {
                source: CodecError::Io(source),
                ..
            } => SyncError::storage(log_path, source),
            MergeError::ExistingLog { source, .. } => SyncError::Decode(source),
            MergeError::Write(source) => SyncError::storage(tmp_path, source),
        }
    }
}
