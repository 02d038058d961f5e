//! /status and /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use sbsync_services::ListStats;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub lists: Vec<ListStats>,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let lists = state.lists.values().map(|list| list.stats()).collect();
    Json(StatusResponse { lists })
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");

    if state.shutdown_tx.send(()).is_err() {
        tracing::warn!("no shutdown listeners registered");
    }

    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
