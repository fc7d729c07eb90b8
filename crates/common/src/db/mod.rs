//! Database layer for Literature Desk
//!
//! Provides:
//! - SeaORM entity model for the single `papers` table
//! - Repository implementing the record store contract
//! - Code assignment from author initials
//! - Connection pool management

mod codes;
pub mod models;
mod repository;

pub use codes::{code_prefix, next_code};
pub use repository::{NewPaper, PaperPatch, PaperRecord, Repository};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS papers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    author TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    published_date TEXT NOT NULL DEFAULT '',
    citation_count INTEGER,
    note TEXT NOT NULL DEFAULT '',
    keywords TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// Database connection pool wrapper
///
/// Clones share one write lock. SQLite allows a single writer, and two
/// deferred transactions that both read before writing fail with
/// `SQLITE_BUSY` instead of waiting, so writers queue here.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
    write_lock: Arc<Mutex<()>>,
}

impl DbPool {
    /// Open (creating if needed) the SQLite database and ensure the schema
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let in_memory = config.path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", config.path)
        };

        info!(path = %config.path, "Opening SQLite database...");

        let mut opts = ConnectOptions::new(url);
        opts.max_connections(if in_memory { 1 } else { config.max_connections.max(1) })
            .min_connections(1)
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to open {}: {}", config.path, e),
            })?;

        let pool = Self {
            conn,
            write_lock: Arc::new(Mutex::new(())),
        };
        pool.migrate().await?;

        info!("Database ready");
        Ok(pool)
    }

    /// Fresh in-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        Self::new(&DatabaseConfig {
            path: ":memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    async fn migrate(&self) -> Result<()> {
        self.conn.execute_unprepared(SCHEMA).await?;
        Ok(())
    }

    /// Connection handle
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Hold while running a transaction that writes
    pub(crate) async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }
}
