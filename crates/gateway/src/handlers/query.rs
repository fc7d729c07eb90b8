//! Literature query handler

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use super::{not_blank, validate_request, ApiJson};
use crate::AppState;
use litdesk_common::{
    db::Repository,
    errors::Result,
    query::QueryAnswer,
};

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[serde(default)]
    #[validate(
        length(max = 2000, message = "question is too long"),
        custom(function = "not_blank", message = "question is required")
    )]
    pub question: String,
}

/// Answer a question from the saved notes
pub async fn query(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<QueryRequest>,
) -> Result<Json<QueryAnswer>> {
    validate_request(&request)?;

    let repo = Repository::new(state.db.clone());
    let records = repo.list().await?;

    let answer = state.answerer.answer(&records, &request.question).await?;

    tracing::info!(
        citations = answer.citations.len(),
        "Question answered"
    );

    Ok(Json(answer))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{body_json, send, test_state};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_query_cites_codes_and_hides_author() {
        let (state, backend) = test_state().await;
        backend.push_reply(r#"{"author":"Jane Doe","title":"Cache Policies"}"#);
        let (status, _) = send(
            &state,
            Method::POST,
            "/api/notes",
            Some(json!({ "noteText": "LRU beats FIFO on skewed workloads." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        backend.push_reply("Jane Doe finds LRU beats FIFO [JD1].");
        let (status, body) = send(
            &state,
            Method::POST,
            "/api/query",
            Some(json!({ "question": "Which eviction policy wins?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let answer = body_json(&body);
        assert_eq!(answer["answer"], "[JD1] finds LRU beats FIFO [JD1].");
        assert_eq!(answer["citations"], json!(["JD1"]));

        let prompt = &backend.requests()[1].prompt;
        assert!(prompt.contains("[JD1]"));
        assert!(prompt.contains("Which eviction policy wins?"));
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let (state, backend) = test_state().await;

        let (status, body) = send(
            &state,
            Method::POST,
            "/api/query",
            Some(json!({ "question": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&body)["error"]["message"], "question is required");
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_502() {
        let (state, backend) = test_state().await;
        backend.push_failure(Some(500), "boom");

        let (status, body) = send(
            &state,
            Method::POST,
            "/api/query",
            Some(json!({ "question": "Anything?" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(&body)["error"]["code"], "BACKEND_UNAVAILABLE");
    }
}
