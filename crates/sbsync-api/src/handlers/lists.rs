//! /lists/{name}/* handlers. Per-list queries and update instructions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use sbsync_core::chunk::{ChunkType, FullHash, Prefix, FULL_HASH_LEN, PREFIX_LEN};
use sbsync_services::{ChunkRanges, SyncReport};

use super::{parse_hash, sync_error_status, ApiState};

// ── /lists/{name}/ranges ──────────────────────────────────────────────────────

pub async fn handle_ranges(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<ChunkRanges>, (StatusCode, String)> {
    Ok(Json(state.list(&name)?.chunk_ranges()))
}

// ── /lists/{name}/lookup/{hash} ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct LookupResponse {
    pub hash: String,
    pub prefix_hit: bool,
    /// Only reported for 32-byte queries.
    pub full_hash_hit: Option<bool>,
    pub resolved: Option<bool>,
    pub cached_verdict: Option<VerdictInfo>,
}

#[derive(Serialize)]
pub struct VerdictInfo {
    pub malicious: bool,
    pub expires_in_secs: u64,
}

pub async fn handle_lookup(
    State(state): State<ApiState>,
    Path((name, hash)): Path<(String, String)>,
) -> Result<Json<LookupResponse>, (StatusCode, String)> {
    let list = state.list(&name)?;
    let bytes = parse_hash(&hash)?;

    // One snapshot for every check so the answers agree with each other.
    let lookup = list.lookup();
    let mut prefix: Prefix = [0u8; PREFIX_LEN];
    prefix.copy_from_slice(&bytes[..PREFIX_LEN]);
    let prefix_hit = lookup.contains_prefix(&prefix);

    let mut resp = LookupResponse {
        hash: hex::encode(&bytes),
        prefix_hit,
        full_hash_hit: None,
        resolved: None,
        cached_verdict: None,
    };

    if bytes.len() == FULL_HASH_LEN {
        let mut full: FullHash = [0u8; FULL_HASH_LEN];
        full.copy_from_slice(&bytes);
        resp.full_hash_hit = Some(lookup.contains_full_hash(&full));
        resp.resolved = Some(lookup.is_resolved(&full));
        resp.cached_verdict = list.verification_cache().get(&full).map(|v| VerdictInfo {
            malicious: v.malicious,
            expires_in_secs: v
                .expires_at
                .saturating_duration_since(std::time::Instant::now())
                .as_secs(),
        });
    }

    Ok(Json(resp))
}

// ── /lists/{name}/deletions (POST) ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DeletionRequest {
    pub chunk_type: ChunkType,
    pub numbers: Vec<u32>,
}

#[derive(Serialize)]
pub struct DeletionResponse {
    pub pending_deletions: usize,
}

pub async fn handle_deletions(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<DeletionRequest>,
) -> Result<Json<DeletionResponse>, (StatusCode, String)> {
    let list = state.list(&name)?;
    for number in &req.numbers {
        list.request_deletion(req.chunk_type, *number);
    }
    tracing::info!(list = %name, chunk_type = %req.chunk_type, count = req.numbers.len(), "deletions queued via API");

    Ok(Json(DeletionResponse {
        pending_deletions: list.pending_deletions().len(),
    }))
}

// ── /lists/{name}/sources (POST) ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SourceRequest {
    pub location: String,
}

#[derive(Serialize)]
pub struct SourceResponse {
    pub pending_sources: usize,
}

pub async fn handle_queue_source(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<SourceRequest>,
) -> Result<Json<SourceResponse>, (StatusCode, String)> {
    let list = state.list(&name)?;
    if req.location.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "location is empty".to_string()));
    }
    list.queue_source(req.location);

    Ok(Json(SourceResponse {
        pending_sources: list.pending_sources().len(),
    }))
}

// ── /lists/{name}/update (POST) ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    /// False when no sources were pending.
    pub updated: bool,
    pub report: Option<SyncReport>,
    pub ranges: ChunkRanges,
}

pub async fn handle_update(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<UpdateResponse>, (StatusCode, String)> {
    let list = state.list(&name)?;
    let fetcher = state.fetcher.clone();
    let decoder = state.decoder.clone();

    let worker = list.clone();
    let result =
        tokio::task::spawn_blocking(move || worker.update(fetcher.as_ref(), decoder.as_ref()))
            .await
            .map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("update task failed: {e}"),
                )
            })?;

    match result {
        Ok(report) => Ok(Json(UpdateResponse {
            updated: report.is_some(),
            report,
            ranges: list.chunk_ranges(),
        })),
        Err(e) => {
            let message = e.chain_message();
            tracing::warn!(list = %name, error = %message, "update via API failed");
            Err((sync_error_status(&e), message))
        }
    }
}
