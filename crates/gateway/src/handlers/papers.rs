//! Paper record handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::ApiJson;
use crate::AppState;
use litdesk_common::{
    db::{NewPaper, PaperPatch, PaperRecord, Repository},
    errors::{AppError, Result},
    extraction::{coerce_citation_count, normalize_keywords},
    metrics,
};

/// List entry; the note itself is only served by the detail endpoint
#[derive(Debug, Serialize)]
pub struct PaperSummary {
    pub id: i64,
    pub code: String,
    pub author: String,
    pub title: String,
    pub url: String,
    pub published_date: String,
    pub citation_count: Option<i64>,
    pub keywords: Option<Vec<String>>,
    pub created_at: String,
}

impl From<PaperRecord> for PaperSummary {
    fn from(record: PaperRecord) -> Self {
        Self {
            id: record.id,
            code: record.code,
            author: record.author,
            title: record.title,
            url: record.url,
            published_date: record.published_date,
            citation_count: record.citation_count,
            keywords: record.keywords,
            created_at: record.created_at,
        }
    }
}

/// Manually entered record; no model call involved
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ManualPaperRequest {
    pub author: String,
    pub title: String,
    pub url: String,
    pub published_date: String,
    pub citation_count: Option<Value>,
    pub note: String,
}

/// Partial edit; absent fields stay as they are
#[derive(Debug, Default, Deserialize)]
pub struct UpdatePaperRequest {
    pub author: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub published_date: Option<String>,
    /// `null` clears the count
    #[serde(default, deserialize_with = "present")]
    pub citation_count: Option<Option<Value>>,
    pub note: Option<String>,
    pub keywords: Option<Vec<String>>,
}

/// Distinguish an explicit `null` from a missing field
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct DeletePapersRequest {
    #[serde(default)]
    pub ids: Value,
}

#[derive(Debug, Serialize)]
pub struct DeletePapersResponse {
    pub deleted: u64,
}

/// Positive integer ids out of a loosely typed list; numeric strings count
pub fn coerce_ids(ids: &Value) -> Vec<i64> {
    let Value::Array(items) = ids else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        })
        .filter(|id| *id > 0)
        .collect()
}

/// List all records, newest first
pub async fn list_papers(State(state): State<AppState>) -> Result<Json<Vec<PaperSummary>>> {
    let repo = Repository::new(state.db.clone());
    let papers = repo.list().await?;
    Ok(Json(papers.into_iter().map(PaperSummary::from).collect()))
}

/// Get a full record by id
pub async fn get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<i64>,
) -> Result<Json<PaperRecord>> {
    let repo = Repository::new(state.db.clone());
    Ok(Json(repo.get(paper_id).await?))
}

/// Create a record from manually entered fields
pub async fn create_paper(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ManualPaperRequest>,
) -> Result<(StatusCode, Json<PaperRecord>)> {
    let title = request.title.trim();
    if title.is_empty() && request.note.trim().is_empty() {
        return Err(AppError::validation("title", "title or note is required"));
    }

    let paper = NewPaper {
        author: request.author.trim().to_string(),
        title: title.to_string(),
        url: request.url.trim().to_string(),
        published_date: request.published_date.trim().to_string(),
        citation_count: coerce_citation_count(request.citation_count.as_ref()),
        note: request.note,
    };

    let repo = Repository::new(state.db.clone());
    let record = repo.create(paper).await?;

    metrics::record_note_created("manual");
    state.trigger.notify();

    tracing::info!(paper_id = record.id, code = %record.code, "Paper entered manually");

    Ok((StatusCode::CREATED, Json(record)))
}

/// Apply a partial edit to a record
pub async fn update_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<i64>,
    ApiJson(request): ApiJson<UpdatePaperRequest>,
) -> Result<Json<PaperRecord>> {
    let max_keywords = state.config.keywords.max_keywords;
    let patch = PaperPatch {
        author: request.author.map(|s| s.trim().to_string()),
        title: request.title.map(|s| s.trim().to_string()),
        url: request.url.map(|s| s.trim().to_string()),
        published_date: request.published_date.map(|s| s.trim().to_string()),
        citation_count: request
            .citation_count
            .map(|value| coerce_citation_count(value.as_ref())),
        note: request.note,
        keywords: request
            .keywords
            .map(|keywords| normalize_keywords(keywords, max_keywords)),
    };

    let repo = Repository::new(state.db.clone());
    let record = repo.update(paper_id, patch).await?;
    state.trigger.notify();

    Ok(Json(record))
}

/// Delete a set of records
pub async fn delete_papers(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeletePapersRequest>,
) -> Result<Json<DeletePapersResponse>> {
    let ids = coerce_ids(&request.ids);
    if ids.is_empty() {
        return Err(AppError::validation("ids", "ids must contain at least one valid id"));
    }

    let repo = Repository::new(state.db.clone());
    let deleted = repo.delete(&ids).await?;
    metrics::record_papers_deleted(deleted);

    Ok(Json(DeletePapersResponse { deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_json, send, test_state};
    use axum::http::Method;
    use serde_json::json;

    async fn create(state: &AppState, body: Value) -> Value {
        let (status, body) = send(state, Method::POST, "/api/papers", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        body_json(&body)
    }

    #[test]
    fn test_coerce_ids() {
        assert_eq!(coerce_ids(&json!([1, "2", " 3 ", 0, -1, "x", null, 2.5])), vec![1, 2, 3]);
        assert!(coerce_ids(&json!("1")).is_empty());
        assert!(coerce_ids(&Value::Null).is_empty());
    }

    #[tokio::test]
    async fn test_list_seeds_demo_and_omits_note() {
        let (state, _) = test_state().await;

        let (status, body) = send(&state, Method::GET, "/api/papers", None).await;
        assert_eq!(status, StatusCode::OK);

        let papers = body_json(&body);
        let papers = papers.as_array().unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0]["author"], "Ada Lovelace");
        assert!(papers[0].get("note").is_none());
        assert!(papers[0].get("code").is_some());
    }

    #[tokio::test]
    async fn test_get_missing_is_404() {
        let (state, _) = test_state().await;

        let (status, body) = send(&state, Method::GET, "/api/papers/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body_json(&body)["error"]["code"], "PAPER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_manual_entry_trims_and_coerces() {
        let (state, backend) = test_state().await;

        let created = create(
            &state,
            json!({
                "author": "  Jane Doe ",
                "title": " Caches ",
                "citation_count": "42",
                "note": " kept as typed "
            }),
        )
        .await;

        assert_eq!(created["code"], "JD1");
        assert_eq!(created["author"], "Jane Doe");
        assert_eq!(created["title"], "Caches");
        assert_eq!(created["citation_count"], 42);
        assert_eq!(created["note"], " kept as typed ");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_manual_entry_needs_title_or_note() {
        let (state, _) = test_state().await;

        let (status, body) = send(
            &state,
            Method::POST,
            "/api/papers",
            Some(json!({ "author": "Doe", "title": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&body)["error"]["field"], "title");
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let (state, _) = test_state().await;
        let created = create(
            &state,
            json!({ "author": "Doe", "title": "Old", "citation_count": 7, "note": "n" }),
        )
        .await;
        let uri = format!("/api/papers/{}", created["id"]);

        let (status, body) = send(
            &state,
            Method::PATCH,
            &uri,
            Some(json!({
                "title": " New ",
                "citation_count": null,
                "keywords": [" cache ", "cache", ""]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let updated = body_json(&body);
        assert_eq!(updated["id"], created["id"]);
        assert_eq!(updated["code"], created["code"]);
        assert_eq!(updated["created_at"], created["created_at"]);
        assert_eq!(updated["author"], "Doe");
        assert_eq!(updated["title"], "New");
        assert_eq!(updated["citation_count"], Value::Null);
        assert_eq!(updated["keywords"], json!(["cache"]));
    }

    #[tokio::test]
    async fn test_update_without_citation_count_keeps_it() {
        let (state, _) = test_state().await;
        let created = create(&state, json!({ "title": "T", "citation_count": 7 })).await;
        let uri = format!("/api/papers/{}", created["id"]);

        let (_, body) = send(&state, Method::PATCH, &uri, Some(json!({ "author": "Roe" }))).await;
        let updated = body_json(&body);
        assert_eq!(updated["citation_count"], 7);
        assert_eq!(updated["author"], "Roe");
        assert_eq!(updated["code"], "X1");
    }

    #[tokio::test]
    async fn test_update_missing_is_404() {
        let (state, _) = test_state().await;

        let (status, _) = send(
            &state,
            Method::PATCH,
            "/api/papers/9",
            Some(json!({ "title": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_counts_present_ids() {
        let (state, _) = test_state().await;
        let a = create(&state, json!({ "title": "A" })).await;
        let b = create(&state, json!({ "title": "B" })).await;

        let (status, body) = send(
            &state,
            Method::DELETE,
            "/api/papers",
            Some(json!({ "ids": [a["id"], b["id"].to_string(), 999] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_json(&body), json!({ "deleted": 2 }));
    }

    #[tokio::test]
    async fn test_delete_rejects_empty_or_invalid_ids() {
        let (state, _) = test_state().await;

        for body in [json!({ "ids": [] }), json!({ "ids": ["x", 0] }), json!({})] {
            let (status, body) = send(&state, Method::DELETE, "/api/papers", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body_json(&body)["error"]["field"], "ids");
        }
    }

    #[tokio::test]
    async fn test_missing_or_mistyped_body_uses_error_envelope() {
        let (state, _) = test_state().await;

        let (status, body) = send(&state, Method::DELETE, "/api/papers", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&body)["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send(
            &state,
            Method::POST,
            "/api/papers",
            Some(json!({ "title": ["not", "a", "string"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&body)["error"]["code"], "VALIDATION_ERROR");
    }
}
