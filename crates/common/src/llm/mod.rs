//! Chat-completion backend abstraction
//!
//! Provides a unified interface for the text-completion services the desk
//! can talk to:
//! - Ollama (self-hosted, `/api/chat`)
//! - OpenAI-compatible cloud APIs (`/chat/completions`)
//! - A scripted mock for tests and offline development
//!
//! Every backend sends exactly one non-streaming request per call and
//! surfaces non-2xx responses with their status code and body text.

mod mock;
mod ollama;
mod openai;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use crate::config::{BackendKind, LlmConfig};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Output shape requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Free text
    Text,
    /// A single JSON object (backends that support it enforce this)
    JsonObject,
}

/// One user turn sent to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub prompt: String,
    pub format: ResponseFormat,
}

impl ChatRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            format: ResponseFormat::Text,
        }
    }

    pub fn json_object(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            format: ResponseFormat::JsonObject,
        }
    }
}

/// Reachability report for the configured backend
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BackendStatus {
    pub backend: String,
    pub model: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Trait for chat-completion backends
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one prompt and return the assistant text.
    ///
    /// A response without assistant content yields an empty string.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Check whether the backend answers at all
    async fn probe(&self) -> BackendStatus;

    /// Short backend name for logs and metrics
    fn name(&self) -> &str;

    /// Model the backend is configured with
    fn model(&self) -> &str;
}

/// Stand-in for a selected backend that cannot run.
///
/// Keeps the server up while every LLM operation fails with the
/// configuration error.
pub struct UnconfiguredBackend {
    name: String,
    model: String,
    message: String,
}

impl UnconfiguredBackend {
    pub fn new(name: &str, model: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl ChatBackend for UnconfiguredBackend {
    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        Err(AppError::Configuration {
            message: self.message.clone(),
        })
    }

    async fn probe(&self) -> BackendStatus {
        BackendStatus {
            backend: self.name.clone(),
            model: self.model.clone(),
            reachable: false,
            models: None,
            message: Some(self.message.clone()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Build the HTTP client shared by the real backends
fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| AppError::Internal {
        message: format!("Failed to create HTTP client: {}", e),
    })
}

/// Turn a non-2xx response into a backend error carrying status and body
async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::BackendUnavailable {
        status: Some(status.as_u16()),
        message: body,
    })
}

/// Create a backend based on configuration
pub fn create_backend(config: &LlmConfig) -> Result<Arc<dyn ChatBackend>> {
    let client = http_client(config)?;

    let backend: Arc<dyn ChatBackend> = match config.resolve_backend() {
        BackendKind::Ollama => Arc::new(OllamaBackend::new(
            client,
            &config.ollama_base_url,
            &config.ollama_model,
            config.temperature,
        )),
        BackendKind::OpenAi => match config.api_key() {
            Some(key) => Arc::new(OpenAiBackend::new(
                client,
                &config.openai_base_url,
                key,
                &config.openai_model,
                config.temperature,
            )),
            None => {
                tracing::warn!("OpenAI backend selected without OPENAI_API_KEY");
                Arc::new(UnconfiguredBackend::new(
                    "openai",
                    &config.openai_model,
                    "Missing OPENAI_API_KEY on the server.",
                ))
            }
        },
    };

    Ok(backend)
}
