//! Note ingestion handler

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use validator::Validate;

use super::{not_blank, validate_request, ApiJson};
use crate::AppState;
use litdesk_common::{
    db::{PaperRecord, Repository},
    errors::{AppError, Result},
    metrics,
};

/// Raw note pasted by the user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateNoteRequest {
    #[serde(rename = "noteText", default)]
    #[validate(custom(function = "not_blank", message = "noteText is required"))]
    pub note_text: String,
}

/// Extract metadata from a note and store the result
pub async fn create_note(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateNoteRequest>,
) -> Result<(StatusCode, Json<PaperRecord>)> {
    validate_request(&request)?;

    let metadata = state
        .extractor
        .extract(&request.note_text)
        .await
        .map_err(AppError::extraction)?;

    let repo = Repository::new(state.db.clone());
    let record = repo.create(metadata.into_new_paper(request.note_text)).await?;

    metrics::record_note_created("note");
    state.trigger.notify();

    tracing::info!(
        paper_id = record.id,
        code = %record.code,
        "Note saved"
    );

    Ok((StatusCode::CREATED, Json(record)))
}
