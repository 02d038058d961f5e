//! Update cycle: fetch pending delta sources and merge them.

use sbsync_core::chunk::ChunkRecord;

use crate::error::SyncError;
use crate::list::SafeList;
use crate::merge::SyncReport;
use crate::source::{ChunkDecoder, Fetcher};

impl SafeList {
    /// Apply every pending delta source.
    ///
    /// All sources must fetch and decode before anything is merged. On any
    /// failure the sources stay queued for the next cycle. Sources queued
    /// while this runs are left for the next cycle too.
    ///
    /// Returns `Ok(None)` if nothing was pending.
    pub fn update(
        &self,
        fetcher: &dyn Fetcher,
        decoder: &dyn ChunkDecoder,
    ) -> Result<Option<SyncReport>, SyncError> {
        let guard = self.begin_update();

        let sources = self.pending_sources();
        if sources.is_empty() {
            tracing::info!(list = %self.name(), "no pending updates available");
            return Ok(None);
        }

        let mut delta: Vec<ChunkRecord> = Vec::new();
        for location in &sources {
            let payload = fetcher.fetch(location)?;
            let records = decoder.decode(payload)?;
            tracing::debug!(
                list = %self.name(),
                location = %location,
                chunks = records.len(),
                "decoded delta source"
            );
            delta.extend(records);
        }
        if delta.is_empty() {
            tracing::warn!(list = %self.name(), sources = sources.len(), "delta sources held no chunks");
        }

        let report = self.synchronize_locked(&guard, &delta)?;
        self.complete_sources(sources.len());
        Ok(Some(report))
    }
}
