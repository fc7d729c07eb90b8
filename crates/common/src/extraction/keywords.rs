//! Keyword generation for stored records

use super::lenient::array_or_default;
use crate::db::PaperRecord;
use crate::errors::Result;
use crate::llm::{ChatBackend, ChatRequest};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Trim, drop blanks and exact duplicates, keep order, cap at `max`
pub fn normalize_keywords<I, S>(keywords: I, max: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    keywords
        .into_iter()
        .filter_map(|k| {
            let k = k.as_ref().trim();
            (!k.is_empty() && seen.insert(k.to_string())).then(|| k.to_string())
        })
        .take(max)
        .collect()
}

/// Keywords from a decoded model array; non-string items are skipped
pub fn keywords_from_values(values: &[Value], max: usize) -> Vec<String> {
    normalize_keywords(values.iter().filter_map(Value::as_str), max)
}

pub fn keyword_prompt(record: &PaperRecord) -> String {
    let mut context = String::new();
    if !record.title.is_empty() {
        context.push_str(&format!("Title: {}\n", record.title));
    }
    if !record.author.is_empty() {
        context.push_str(&format!("Author: {}\n", record.author));
    }

    format!(
        "You are a strict JSON generator.\n\
         Read the research note below and choose 5 to 8 short topical keywords for it.\n\
         Return ONLY a JSON array of strings, for example [\"memory\", \"caching\"].\n\
         \n\
         {}NOTE:\n{}",
        context, record.note
    )
}

/// Generates topical keywords for one record per call
#[derive(Clone)]
pub struct KeywordExtractor {
    backend: Arc<dyn ChatBackend>,
    max_keywords: usize,
}

impl KeywordExtractor {
    pub fn new(backend: Arc<dyn ChatBackend>, max_keywords: usize) -> Self {
        Self {
            backend,
            max_keywords,
        }
    }

    /// Ask the backend for keywords. An unusable reply yields an empty
    /// list, which leaves the record eligible for a later cycle.
    #[instrument(skip(self, record), fields(paper_id = record.id, backend = self.backend.name()))]
    pub async fn extract(&self, record: &PaperRecord) -> Result<Vec<String>> {
        let content = self
            .backend
            .complete(&ChatRequest::json_object(keyword_prompt(record)))
            .await?;

        let keywords = keywords_from_values(&array_or_default(&content), self.max_keywords);
        debug!(count = keywords.len(), "Keywords generated");
        Ok(keywords)
    }
}
