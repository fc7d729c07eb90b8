//! Question answering over the saved notes
//!
//! The model only sees a bounded window of records, identified by code.
//! Answers must cite records as `[CODE]`; author names, titles and links
//! are forbidden in the prompt and scrubbed from the reply afterwards.

use crate::db::PaperRecord;
use crate::errors::{AppError, Result};
use crate::llm::{ChatBackend, ChatRequest};
use regex_lite::{NoExpand, Regex};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument};

/// Fixed reply when the notes cannot support an answer
pub const REFUSAL: &str = "I can't answer that from the saved notes.";

/// Fields shorter than this are left alone by redaction
const MIN_REDACT_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    /// Context codes the answer cites, in order of first use
    pub citations: Vec<String>,
}

impl QueryAnswer {
    fn refusal() -> Self {
        Self {
            answer: REFUSAL.to_string(),
            citations: Vec::new(),
        }
    }
}

fn citation_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\[\]\s]+)\]").expect("static regex"))
}

/// Render the context block the model answers from
pub fn render_context(records: &[PaperRecord]) -> String {
    let mut context = String::new();
    for record in records {
        let _ = writeln!(context, "[{}]", record.code);
        if !record.title.is_empty() {
            let _ = writeln!(context, "Title: {}", record.title);
        }
        if !record.published_date.is_empty() {
            let _ = writeln!(context, "Published: {}", record.published_date);
        }
        if let Some(ref keywords) = record.keywords {
            let _ = writeln!(context, "Keywords: {}", keywords.join(", "));
        }
        let _ = writeln!(context, "Note: {}\n", record.note.trim());
    }
    context
}

pub fn query_prompt(context: &[PaperRecord], question: &str) -> String {
    format!(
        "You answer questions using ONLY the saved research notes below.\n\
         Each note starts with its code in square brackets, for example [D1].\n\
         Rules:\n\
         - Support every factual claim with the code of the note it comes from, written exactly as [CODE].\n\
         - Never write author names, paper titles, or URLs. Refer to notes only by their code.\n\
         - If the notes do not contain the answer, reply exactly: {}\n\
         \n\
         NOTES:\n{}\
         QUESTION:\n{}",
        REFUSAL,
        render_context(context),
        question
    )
}

/// Replace verbatim author, title and url of each context record with its tag.
///
/// Author and title only match as whole words, so "Doe" leaves "Does"
/// alone. URLs match anywhere.
pub fn redact_answer(answer: &str, context: &[PaperRecord]) -> String {
    let mut replacements: Vec<(&str, bool, String)> = context
        .iter()
        .flat_map(|record| {
            let tag = format!("[{}]", record.code);
            [
                (record.url.trim(), false),
                (record.title.trim(), true),
                (record.author.trim(), true),
            ]
            .into_iter()
            .filter(|(field, _)| field.chars().count() >= MIN_REDACT_LEN)
            .map(move |(field, whole_word)| (field, whole_word, tag.clone()))
        })
        .collect();
    // Longest first so a URL is replaced before a title it contains
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    replacements
        .into_iter()
        .fold(answer.to_string(), |text, (needle, whole_word, tag)| {
            if !whole_word {
                return text.replace(needle, &tag);
            }
            match word_pattern(needle) {
                Some(re) => re.replace_all(&text, NoExpand(&tag)).into_owned(),
                None => text.replace(needle, &tag),
            }
        })
}

/// `needle` bounded by `\b` on each side that starts or ends in a word char
fn word_pattern(needle: &str) -> Option<Regex> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let start = needle.chars().next().is_some_and(is_word);
    let end = needle.chars().next_back().is_some_and(is_word);

    let pattern = format!(
        "{}{}{}",
        if start { r"\b" } else { "" },
        regex_lite::escape(needle),
        if end { r"\b" } else { "" },
    );
    Regex::new(&pattern).ok()
}

/// Codes cited as `[CODE]` that belong to the context, first use first
pub fn cited_codes(answer: &str, context: &[PaperRecord]) -> Vec<String> {
    let known: HashSet<&str> = context.iter().map(|r| r.code.as_str()).collect();
    let mut seen = HashSet::new();
    citation_tag()
        .captures_iter(answer)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|code| known.contains(code) && seen.insert(*code))
        .map(str::to_string)
        .collect()
}

/// Answers questions from a bounded slice of records
#[derive(Clone)]
pub struct QueryAnswerer {
    backend: Arc<dyn ChatBackend>,
    context_records: usize,
}

impl QueryAnswerer {
    pub fn new(backend: Arc<dyn ChatBackend>, context_records: usize) -> Self {
        Self {
            backend,
            context_records,
        }
    }

    /// Answer `question` from the first records of `records` (list order).
    #[instrument(skip(self, records, question), fields(backend = self.backend.name(), records = records.len()))]
    pub async fn answer(&self, records: &[PaperRecord], question: &str) -> Result<QueryAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::validation("question", "question is required"));
        }

        let context = &records[..records.len().min(self.context_records)];
        if context.is_empty() {
            debug!("No saved notes, refusing without a backend call");
            return Ok(QueryAnswer::refusal());
        }

        let reply = self
            .backend
            .complete(&ChatRequest::text(query_prompt(context, question)))
            .await?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Ok(QueryAnswer::refusal());
        }

        let answer = redact_answer(reply, context);
        let citations = cited_codes(&answer, context);
        debug!(citations = citations.len(), "Question answered");

        Ok(QueryAnswer { answer, citations })
    }
}
