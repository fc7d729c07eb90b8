//! Literature Desk Common Library
//!
//! Everything behind the HTTP surface:
//! - Record store (SeaORM over SQLite) and code assignment
//! - Chat-completion backends (Ollama, OpenAI-compatible, mock)
//! - Metadata and keyword extraction with lenient JSON decoding
//! - Background keyword worker
//! - Query answering and the timeline view
//! - Error types, configuration, metrics

pub mod config;
pub mod db;
pub mod errors;
pub mod extraction;
pub mod keywords;
pub mod llm;
pub mod metrics;
pub mod query;
pub mod timeline;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, PaperRecord, Repository};
pub use errors::{AppError, Result};
pub use llm::ChatBackend;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
