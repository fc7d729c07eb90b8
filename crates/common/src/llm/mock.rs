//! Scripted backend for tests and offline development

use super::{BackendStatus, ChatBackend, ChatRequest};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

enum Reply {
    Text(String),
    Fail { status: Option<u16>, message: String },
}

/// Mock backend replaying queued replies in order.
///
/// Once the queue is drained every call returns the fallback reply
/// (`"{}"` unless changed). Prompts are recorded for inspection.
pub struct MockBackend {
    replies: Mutex<VecDeque<Reply>>,
    fallback: String,
    prompts: Mutex<Vec<ChatRequest>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: "{}".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Backend that always answers `reply`
    pub fn always(reply: impl Into<String>) -> Self {
        Self {
            fallback: reply.into(),
            ..Self::new()
        }
    }

    /// Queue a successful reply
    pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
        self.lock_replies().push_back(Reply::Text(reply.into()));
        self
    }

    /// Queue a failed call
    pub fn push_failure(&self, status: Option<u16>, message: impl Into<String>) -> &Self {
        self.lock_replies().push_back(Reply::Fail {
            status,
            message: message.into(),
        });
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Reply>> {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        match self.lock_replies().pop_front() {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail { status, message }) => {
                Err(AppError::BackendUnavailable { status, message })
            }
            None => Ok(self.fallback.clone()),
        }
    }

    async fn probe(&self) -> BackendStatus {
        BackendStatus {
            backend: "mock".to_string(),
            model: "mock-chat".to_string(),
            reachable: true,
            models: Some(1),
            message: None,
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-chat"
    }
}
