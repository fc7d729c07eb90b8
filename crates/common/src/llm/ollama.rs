//! Ollama backend (`POST /api/chat`, `GET /api/tags`)

use super::{error_for_status, BackendStatus, ChatBackend, ChatRequest, ResponseFormat};
use crate::errors::{AppError, Result};
use crate::metrics::LlmCallTimer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Self-hosted model served by Ollama
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<serde_json::Value>,
}

impl OllamaBackend {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, temperature: f32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        }
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<String> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
            format: match request.format {
                ResponseFormat::JsonObject => Some("json"),
                ResponseFormat::Text => None,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable {
                status: None,
                message: format!("Ollama request failed: {}", e),
            })?;

        let response = error_for_status(response).await?;

        let parsed: OllamaChatResponse =
            response.json().await.map_err(|e| AppError::BackendUnavailable {
                status: None,
                message: format!("Failed to parse Ollama response: {}", e),
            })?;

        Ok(parsed
            .message
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    #[instrument(skip(self, request), fields(backend = "ollama", model = %self.model))]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let timer = LlmCallTimer::start("ollama");
        let result = self.send_chat(request).await;
        timer.finish(result.is_ok());

        if let Ok(ref content) = result {
            debug!(chars = content.len(), "Ollama completion received");
        }
        result
    }

    async fn probe(&self) -> BackendStatus {
        let mut status = BackendStatus {
            backend: "ollama".to_string(),
            model: self.model.clone(),
            reachable: false,
            models: None,
            message: None,
        };

        let result = async {
            let response = self
                .client
                .get(format!("{}/api/tags", self.base_url))
                .send()
                .await?;
            let response = error_for_status(response).await?;
            let tags: OllamaTags = response.json().await?;
            Ok::<_, AppError>(tags.models.len())
        }
        .await;

        match result {
            Ok(count) => {
                status.reachable = true;
                status.models = Some(count);
                status.message = Some(if count > 0 {
                    format!("{} model(s)", count)
                } else {
                    "No models".to_string()
                });
            }
            Err(e) => status.message = Some(format!("Not reachable: {}", e)),
        }
        status
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> OllamaBackend {
        OllamaBackend::new(reqwest::Client::new(), &server.uri(), "llama3.1", 0.2)
    }

    #[tokio::test]
    async fn test_chat_request_shape_and_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.1",
                "stream": false,
                "format": "json",
                "messages": [{"role": "user", "content": "extract this"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3.1",
                "message": {"role": "assistant", "content": "{\"author\":\"Doe\"}"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let content = backend(&server)
            .complete(&ChatRequest::json_object("extract this"))
            .await
            .unwrap();
        assert_eq!(content, "{\"author\":\"Doe\"}");
    }

    #[tokio::test]
    async fn test_missing_content_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"done": true})))
            .mount(&server)
            .await;

        let content = backend(&server).complete(&ChatRequest::text("hi")).await.unwrap();
        assert_eq!(content, "");
    }

    #[tokio::test]
    async fn test_non_2xx_carries_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model 'llama3.1' not found"))
            .mount(&server)
            .await;

        let err = backend(&server).complete(&ChatRequest::text("hi")).await.unwrap_err();
        match err {
            AppError::BackendUnavailable { status, message } => {
                assert_eq!(status, Some(404));
                assert_eq!(message, "model 'llama3.1' not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_counts_models() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3.1"}, {"name": "mistral"}]
            })))
            .mount(&server)
            .await;

        let status = backend(&server).probe().await;
        assert!(status.reachable);
        assert_eq!(status.models, Some(2));
        assert_eq!(status.message.as_deref(), Some("2 model(s)"));
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let backend = OllamaBackend::new(reqwest::Client::new(), &uri, "llama3.1", 0.2);
        let status = backend.probe().await;
        assert!(!status.reachable);
        assert!(status.message.unwrap().starts_with("Not reachable"));
    }
}
