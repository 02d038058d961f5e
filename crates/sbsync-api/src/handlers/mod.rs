//! HTTP API handlers. Exposes list state as JSON.

pub mod lists;
pub mod status;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;

use sbsync_services::{ChunkDecoder, Fetcher, SafeList, SyncError};

#[derive(Clone)]
pub struct ApiState {
    /// Every configured list, keyed by name.
    pub lists: Arc<BTreeMap<String, Arc<SafeList>>>,
    pub fetcher: Arc<dyn Fetcher>,
    pub decoder: Arc<dyn ChunkDecoder>,
    /// Shutdown broadcast sender. Signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl ApiState {
    fn list(&self, name: &str) -> Result<Arc<SafeList>, (StatusCode, String)> {
        self.lists
            .get(name)
            .cloned()
            .ok_or_else(|| (StatusCode::NOT_FOUND, format!("unknown list: {name}")))
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Parse a hex-encoded prefix (4 bytes) or full hash (32 bytes).
fn parse_hash(hex_str: &str) -> Result<Vec<u8>, (StatusCode, String)> {
    let bytes =
        hex::decode(hex_str).map_err(|_| (StatusCode::BAD_REQUEST, "invalid hex".to_string()))?;
    match bytes.len() {
        sbsync_core::chunk::PREFIX_LEN | sbsync_core::chunk::FULL_HASH_LEN => Ok(bytes),
        _ => Err((
            StatusCode::BAD_REQUEST,
            "hash must be 4 or 32 bytes".to_string(),
        )),
    }
}

fn sync_error_status(err: &SyncError) -> StatusCode {
    match err {
        SyncError::Transport { .. } => StatusCode::BAD_GATEWAY,
        SyncError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SyncError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Re-export handler functions for use in router setup.
pub use lists::{
    handle_deletions, handle_lookup, handle_queue_source, handle_ranges, handle_update,
};
pub use status::{handle_shutdown, handle_status};
