//! OpenAI-compatible cloud backend (`POST /chat/completions`)

use super::{error_for_status, BackendStatus, ChatBackend, ChatRequest, ResponseFormat};
use crate::errors::{AppError, Result};
use crate::metrics::LlmCallTimer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Cloud chat-completion API authenticated with a bearer key
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormatParam {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatParam>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

impl OpenAiBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
        }
    }

    async fn send_completion(&self, request: &ChatRequest) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: self.temperature,
            stream: false,
            response_format: match request.format {
                ResponseFormat::JsonObject => Some(ResponseFormatParam { kind: "json_object" }),
                ResponseFormat::Text => None,
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::BackendUnavailable {
                status: None,
                message: format!("OpenAI request failed: {}", e),
            })?;

        let response = error_for_status(response).await?;

        let parsed: CompletionResponse =
            response.json().await.map_err(|e| AppError::BackendUnavailable {
                status: None,
                message: format!("Failed to parse OpenAI response: {}", e),
            })?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    #[instrument(skip(self, request), fields(backend = "openai", model = %self.model))]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let timer = LlmCallTimer::start("openai");
        let result = self.send_completion(request).await;
        timer.finish(result.is_ok());

        if let Ok(ref content) = result {
            debug!(chars = content.len(), "OpenAI completion received");
        }
        result
    }

    async fn probe(&self) -> BackendStatus {
        let mut status = BackendStatus {
            backend: "openai".to_string(),
            model: self.model.clone(),
            reachable: false,
            models: None,
            message: None,
        };

        let result = async {
            let response = self
                .client
                .get(format!("{}/models", self.base_url))
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            let response = error_for_status(response).await?;
            let list: ModelList = response.json().await?;
            Ok::<_, AppError>(list.data.len())
        }
        .await;

        match result {
            Ok(count) => {
                status.reachable = true;
                status.models = Some(count);
            }
            Err(e) => status.message = Some(format!("Not reachable: {}", e)),
        }
        status
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
