//! Backend status handler

use axum::{extract::State, Json};
use litdesk_common::llm::BackendStatus;

use crate::AppState;

/// Report the selected chat backend and whether it answers
pub async fn backend_status(State(state): State<AppState>) -> Json<BackendStatus> {
    let status = state.backend.probe().await;
    if !status.reachable {
        tracing::warn!(
            backend = %status.backend,
            message = ?status.message,
            "Chat backend not reachable"
        );
    }
    Json(status)
}
