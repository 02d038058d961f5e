//! sbsyncd: blocklist synchronization daemon.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use sbsync_core::config::SbsyncConfig;
use sbsync_services::{ChunkDecoder, Fetcher, FileFetcher, FramedDecoder, SafeList};

mod updater;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = SbsyncConfig::write_default_if_missing() {
        tracing::warn!(error = %e, path = %SbsyncConfig::file_path().display(), "failed to write default config");
    }
    let config = SbsyncConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SbsyncConfig::default()
    });

    tracing::info!(
        data_dir = %config.storage.data_dir.display(),
        lists = config.lists.len(),
        "sbsyncd starting"
    );

    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!(
            "failed to create data dir {}",
            config.storage.data_dir.display()
        )
    })?;
    let source_root = config.source_root();
    std::fs::create_dir_all(&source_root)
        .with_context(|| format!("failed to create source root {}", source_root.display()))?;

    // Lists
    let cache_ttl = Duration::from_secs(config.update.cache_ttl_secs);
    let mut lists = BTreeMap::new();
    for name in &config.lists {
        let path = config.log_path(name);
        let list = SafeList::open(name.clone(), path, cache_ttl)
            .with_context(|| format!("failed to open list {name}"))?;
        let ranges = list.chunk_ranges();
        tracing::info!(list = %name, add = %ranges.add, sub = %ranges.sub, "list loaded");
        lists.insert(name.clone(), Arc::new(list));
    }
    let lists = Arc::new(lists);

    let fetcher: Arc<dyn Fetcher> = Arc::new(FileFetcher::new(source_root));
    let decoder: Arc<dyn ChunkDecoder> = Arc::new(FramedDecoder);

    // ── Shutdown channel ─────────────────────────────────────────────────────

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let updater_task = tokio::spawn(
        updater::Updater::new(
            lists.clone(),
            fetcher.clone(),
            decoder.clone(),
            Duration::from_secs(config.update.interval_secs.max(1)),
            shutdown_tx.subscribe(),
        )
        .run(),
    );

    let api_port = config.api.port;
    let api_task = {
        let state = sbsync_api::ApiState {
            lists,
            fetcher,
            decoder,
            shutdown_tx: shutdown_tx.clone(),
        };
        tokio::spawn(async move { sbsync_api::serve(state, api_port).await })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = updater_task       => tracing::error!("updater exited: {:?}", r),
        r = api_task           => tracing::error!("API server exited: {:?}", r),
    }

    Ok(())
}
