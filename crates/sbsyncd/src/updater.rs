//! Update loop. Runs the update cycle for every list on a fixed interval
//! and sweeps expired verification verdicts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use sbsync_services::{ChunkDecoder, Fetcher, SafeList};

pub struct Updater {
    lists: Arc<BTreeMap<String, Arc<SafeList>>>,
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn ChunkDecoder>,
    interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl Updater {
    pub fn new(
        lists: Arc<BTreeMap<String, Arc<SafeList>>>,
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn ChunkDecoder>,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            lists,
            fetcher,
            decoder,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("updater shutting down");
                    return Ok(());
                }

                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        for list in self.lists.values() {
            let purged = list.verification_cache().purge_expired();
            if purged > 0 {
                tracing::debug!(list = %list.name(), purged, "expired verdicts purged");
            }

            let worker = list.clone();
            let fetcher = self.fetcher.clone();
            let decoder = self.decoder.clone();
            let result = tokio::task::spawn_blocking(move || {
                worker.update(fetcher.as_ref(), decoder.as_ref())
            })
            .await;

            match result {
                Ok(Ok(Some(report))) => tracing::info!(
                    list = %list.name(),
                    added = report.added(),
                    deleted = report.deleted(),
                    "scheduled update applied"
                ),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(list = %list.name(), error = %e.chain_message(), "scheduled update failed, will retry")
                }
                Err(e) => tracing::error!(list = %list.name(), error = %e, "update task panicked"),
            }
        }
    }
}
