//! Delta sources: where update payloads come from and how they decode.
//!
//! Both seams are traits so the update cycle can run against a transport
//! other than the local filesystem.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use sbsync_core::chunk::ChunkRecord;
use sbsync_core::codec::RecordReader;

use crate::error::SyncError;

/// Retrieves the raw bytes behind a delta source location.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, location: &str) -> Result<Bytes, SyncError>;
}

/// Turns a fetched payload into chunk records.
pub trait ChunkDecoder: Send + Sync {
    fn decode(&self, payload: Bytes) -> Result<Vec<ChunkRecord>, SyncError>;
}

/// Reads delta sources from a local directory.
///
/// Locations are paths relative to `root`, optionally prefixed with
/// `file://`. Absolute paths and `..` components are refused.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, SyncError> {
        let relative = Path::new(location.strip_prefix("file://").unwrap_or(location));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(SyncError::Transport {
                location: location.to_string(),
                reason: "location must be a relative path inside the source root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, location: &str) -> Result<Bytes, SyncError> {
        let path = self.resolve(location)?;
        let data = std::fs::read(&path).map_err(|e| SyncError::Transport {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(location, bytes = data.len(), "fetched delta source");
        Ok(Bytes::from(data))
    }
}

/// Decodes payloads framed with the chunk record format.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramedDecoder;

impl ChunkDecoder for FramedDecoder {
    fn decode(&self, payload: Bytes) -> Result<Vec<ChunkRecord>, SyncError> {
        RecordReader::new(Cursor::new(payload))
            .collect::<Result<Vec<_>, _>>()
            .map_err(SyncError::from)
    }
}
