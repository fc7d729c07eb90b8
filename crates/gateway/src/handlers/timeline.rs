//! Timeline handler

use axum::{extract::State, Json};

use crate::AppState;
use litdesk_common::{
    db::Repository,
    errors::Result,
    timeline::{build_timeline, TimelineEntry},
};

/// Records ordered by publication year with short summaries
pub async fn timeline(State(state): State<AppState>) -> Result<Json<Vec<TimelineEntry>>> {
    let repo = Repository::new(state.db.clone());
    let records = repo.list().await?;
    Ok(Json(build_timeline(&records, &state.in_flight.snapshot())))
}
