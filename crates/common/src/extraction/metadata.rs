//! Paper metadata extraction from a raw note

use super::lenient::object_or_default;
use crate::db::NewPaper;
use crate::errors::{AppError, Result};
use crate::llm::{ChatBackend, ChatRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Best-effort metadata; every field falls back to empty / null
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub author: String,
    pub title: String,
    pub url: String,
    pub published_date: String,
    pub citation_count: Option<i64>,
}

impl ExtractedMetadata {
    /// Coerce raw model output into metadata. Never fails.
    pub fn from_model_output(content: &str) -> Self {
        Self::from_fields(&object_or_default(content))
    }

    /// Coerce each field of a decoded object independently
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            author: coerce_string(fields.get("author")),
            title: coerce_string(fields.get("title")),
            url: coerce_string(fields.get("url")),
            published_date: coerce_string(fields.get("published_date")),
            citation_count: coerce_citation_count(fields.get("citation_count")),
        }
    }

    /// Combine with the untouched note into a record to store
    pub fn into_new_paper(self, note: String) -> NewPaper {
        NewPaper {
            author: self.author,
            title: self.title,
            url: self.url,
            published_date: self.published_date,
            citation_count: self.citation_count,
            note,
        }
    }
}

/// Strings are trimmed; anything else becomes empty
pub fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

/// Numbers pass (fractions truncate toward zero), numeric strings are
/// converted, everything else is null
pub fn coerce_citation_count(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// Prompt demanding exactly the five metadata keys
pub fn metadata_prompt(note: &str) -> String {
    format!(
        "You are a strict JSON generator.\n\
         Extract the paper metadata from the note below.\n\
         Return ONLY a JSON object with keys: author, title, url, published_date, citation_count.\n\
         If a field is unknown, use an empty string or null for citation_count.\n\
         \n\
         NOTE:\n{}",
        note
    )
}

/// Turns free-form notes into structured metadata with one model call
#[derive(Clone)]
pub struct MetadataExtractor {
    backend: Arc<dyn ChatBackend>,
}

impl MetadataExtractor {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Extract metadata from `note`.
    ///
    /// Fails only when the note is blank or the backend call fails;
    /// malformed model output degrades to empty fields.
    #[instrument(skip(self, note), fields(backend = self.backend.name(), note_len = note.len()))]
    pub async fn extract(&self, note: &str) -> Result<ExtractedMetadata> {
        if note.trim().is_empty() {
            return Err(AppError::validation("noteText", "noteText is required"));
        }

        let content = self
            .backend
            .complete(&ChatRequest::json_object(metadata_prompt(note)))
            .await?;

        let metadata = ExtractedMetadata::from_model_output(&content);
        debug!(
            has_author = !metadata.author.is_empty(),
            has_title = !metadata.title.is_empty(),
            has_url = !metadata.url.is_empty(),
            "Metadata extracted"
        );
        Ok(metadata)
    }
}
