//! LLM-backed extraction
//!
//! - Metadata: one call per note, result coerced field by field
//! - Keywords: one call per stored record, used by the background worker
//!
//! Model output is never trusted to be valid JSON; see [`lenient`].

mod keywords;
pub mod lenient;
mod metadata;

pub use keywords::{keyword_prompt, keywords_from_values, normalize_keywords, KeywordExtractor};
pub use metadata::{
    coerce_citation_count, coerce_string, metadata_prompt, ExtractedMetadata, MetadataExtractor,
};
