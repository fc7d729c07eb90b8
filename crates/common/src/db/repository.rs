//! Repository pattern for the paper record store
//!
//! The repository is the only writer of persisted state. Every operation
//! that reads before it writes (code assignment, seeding, partial updates)
//! runs inside a single transaction, and writers take the pool's write
//! lock first so concurrent callers queue instead of hitting a busy database.

use crate::db::codes::next_code;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// A stored paper record as handed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: i64,
    pub code: String,
    pub author: String,
    pub title: String,
    pub url: String,
    pub published_date: String,
    pub citation_count: Option<i64>,
    pub note: String,
    pub keywords: Option<Vec<String>>,
    pub created_at: String,
}

impl PaperRecord {
    /// True once keyword generation produced a non-empty list
    pub fn has_keywords(&self) -> bool {
        self.keywords.as_ref().is_some_and(|k| !k.is_empty())
    }
}

impl From<Paper> for PaperRecord {
    fn from(model: Paper) -> Self {
        let keywords = model
            .keywords
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .filter(|keywords| !keywords.is_empty());

        Self {
            id: model.id,
            code: model.code,
            author: model.author,
            title: model.title,
            url: model.url,
            published_date: model.published_date,
            citation_count: model.citation_count,
            note: model.note,
            keywords,
            created_at: model.created_at,
        }
    }
}

/// Fields for a new record, from extraction or manual entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPaper {
    pub author: String,
    pub title: String,
    pub url: String,
    pub published_date: String,
    pub citation_count: Option<i64>,
    pub note: String,
}

impl NewPaper {
    /// Placeholder record written into an empty store
    pub fn demo() -> Self {
        Self {
            author: "Ada Lovelace".to_string(),
            title: "Notes on the Analytical Engine".to_string(),
            url: "https://en.wikipedia.org/wiki/Note_G".to_string(),
            published_date: "1843".to_string(),
            citation_count: None,
            note: "Demo entry. Paste a raw research note, abstract, or citation and the \
                   desk extracts author, title, link, date and citation count for you.\n\
                   - Lovelace describes an algorithm for Bernoulli numbers.\n\
                   - The engine could act on symbols other than numbers."
                .to_string(),
        }
    }
}

/// Partial update; `None` leaves a field untouched.
///
/// `citation_count: Some(None)` clears the count. An empty keyword list
/// resets the record to "not yet processed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperPatch {
    pub author: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub published_date: Option<String>,
    pub citation_count: Option<Option<i64>>,
    pub note: Option<String>,
    pub keywords: Option<Vec<String>>,
}

impl PaperPatch {
    /// Patch that only sets keywords
    pub fn keywords(keywords: Vec<String>) -> Self {
        Self {
            keywords: Some(keywords),
            ..Default::default()
        }
    }
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Paper Operations
    // ========================================================================

    /// Create a record, assigning id, code and created_at
    #[instrument(skip(self, paper), fields(author = %paper.author))]
    pub async fn create(&self, paper: NewPaper) -> Result<PaperRecord> {
        let _write = self.pool.write_lock().await;
        let txn = self.conn().begin().await?;
        let record = insert_paper(&txn, paper).await?;
        txn.commit().await?;

        info!(paper_id = record.id, code = %record.code, "Paper created");
        Ok(record)
    }

    /// All records, newest id first.
    ///
    /// An empty table is seeded with one demo record first. This also
    /// happens after a bulk delete empties the table.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<PaperRecord>> {
        // May seed, so it queues with the writers
        let _write = self.pool.write_lock().await;
        let txn = self.conn().begin().await?;

        if PaperEntity::find().count(&txn).await? == 0 {
            let demo = insert_paper(&txn, NewPaper::demo()).await?;
            info!(paper_id = demo.id, code = %demo.code, "Seeded demo paper into empty store");
        }

        let papers = PaperEntity::find()
            .order_by_desc(PaperColumn::Id)
            .all(&txn)
            .await?;
        txn.commit().await?;

        Ok(papers.into_iter().map(PaperRecord::from).collect())
    }

    /// Find a record by id
    pub async fn get(&self, id: i64) -> Result<PaperRecord> {
        PaperEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .map(PaperRecord::from)
            .ok_or(AppError::PaperNotFound { id })
    }

    /// Merge `patch` onto an existing record.
    ///
    /// id, code and created_at are never touched.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: PaperPatch) -> Result<PaperRecord> {
        let _write = self.pool.write_lock().await;
        let txn = self.conn().begin().await?;

        let existing = PaperEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(AppError::PaperNotFound { id })?;

        let mut active: PaperActiveModel = existing.clone().into();
        if let Some(author) = patch.author {
            active.author = Set(author);
        }
        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(url) = patch.url {
            active.url = Set(url);
        }
        if let Some(published_date) = patch.published_date {
            active.published_date = Set(published_date);
        }
        if let Some(citation_count) = patch.citation_count {
            active.citation_count = Set(citation_count);
        }
        if let Some(note) = patch.note {
            active.note = Set(note);
        }
        if let Some(keywords) = patch.keywords {
            active.keywords = Set(encode_keywords(&keywords)?);
        }

        if !active.is_changed() {
            txn.commit().await?;
            debug!(paper_id = id, "Update carried no changes");
            return Ok(existing.into());
        }

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        debug!(paper_id = id, "Paper updated");
        Ok(updated.into())
    }

    /// Delete every record whose id is in `ids`; returns how many went.
    ///
    /// Unknown ids are ignored. Non-positive ids are dropped before the
    /// query, and nothing is sent at all when no id survives.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn delete(&self, ids: &[i64]) -> Result<u64> {
        let ids: BTreeSet<i64> = ids.iter().copied().filter(|id| *id > 0).collect();
        if ids.is_empty() {
            debug!("Nothing to delete");
            return Ok(0);
        }

        let _write = self.pool.write_lock().await;
        let result = PaperEntity::delete_many()
            .filter(PaperColumn::Id.is_in(ids))
            .exec(self.conn())
            .await?;

        info!(deleted = result.rows_affected, "Papers deleted");
        Ok(result.rows_affected)
    }
}

async fn insert_paper<C: ConnectionTrait>(conn: &C, paper: NewPaper) -> Result<PaperRecord> {
    let existing: Vec<String> = PaperEntity::find()
        .select_only()
        .column(PaperColumn::Code)
        .into_tuple()
        .all(conn)
        .await?;
    let code = next_code(&paper.author, existing.iter().map(String::as_str));

    let model = PaperActiveModel {
        id: NotSet,
        code: Set(code),
        author: Set(paper.author),
        title: Set(paper.title),
        url: Set(paper.url),
        published_date: Set(paper.published_date),
        citation_count: Set(paper.citation_count),
        note: Set(paper.note),
        keywords: Set(None),
        created_at: Set(now_timestamp()),
    };

    Ok(model.insert(conn).await?.into())
}

fn encode_keywords(keywords: &[String]) -> Result<Option<String>> {
    if keywords.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(keywords)?))
}

/// Same shape as SQLite's `datetime('now')`
fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use std::collections::HashSet;
    use tokio::task::JoinSet;
    use tokio_test::{assert_err, assert_ok};

    async fn repo() -> Repository {
        Repository::new(DbPool::in_memory().await.unwrap())
    }

    fn paper(author: &str, note: &str) -> NewPaper {
        NewPaper {
            author: author.to_string(),
            note: note.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_note_is_stored_verbatim() {
        let repo = repo().await;
        let note = "  Doe (2020) shows X.\n\t- bullet ✓ \"quoted\" https://e.co  ";

        let created = repo.create(paper("Doe", note)).await.unwrap();
        let fetched = repo.get(created.id).await.unwrap();

        assert_eq!(fetched.note, note);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_codes_are_unique_across_creates() {
        let repo = repo().await;
        let authors = ["Doe", "Jane Doe", "Doe", "", "Dan", "John Doe", "!!", "Doe"];

        let mut codes = HashSet::new();
        for author in authors {
            let created = repo.create(paper(author, "n")).await.unwrap();
            assert!(codes.insert(created.code.clone()), "duplicate {}", created.code);
        }

        assert!(codes.contains("D1") && codes.contains("D2") && codes.contains("D3"));
        assert!(codes.contains("D4"));
        assert!(codes.contains("JD1") && codes.contains("JD2"));
        assert!(codes.contains("X1") && codes.contains("X2"));
    }

    #[tokio::test]
    async fn test_freed_counter_is_reused_for_new_records_only() {
        let repo = repo().await;
        let first = repo.create(paper("Doe", "a")).await.unwrap();
        let second = repo.create(paper("Doe", "b")).await.unwrap();
        assert_eq!((first.code.as_str(), second.code.as_str()), ("D1", "D2"));

        repo.delete(&[first.id]).await.unwrap();
        let third = repo.create(paper("Doe", "c")).await.unwrap();
        assert_eq!(third.code, "D1");
        assert_eq!(repo.get(second.id).await.unwrap().code, "D2");
    }

    #[tokio::test]
    async fn test_list_seeds_once() {
        let repo = repo().await;

        let first = repo.list().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].title, NewPaper::demo().title);

        let second = repo.list().await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_list_does_not_seed_when_rows_exist() {
        let repo = repo().await;
        repo.create(paper("Doe", "a")).await.unwrap();
        repo.create(paper("Roe", "b")).await.unwrap();

        let papers = repo.list().await.unwrap();
        let codes: Vec<_> = papers.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["R1", "D1"]);
    }

    #[tokio::test]
    async fn test_list_reseeds_after_store_is_emptied() {
        let repo = repo().await;
        let created = repo.create(paper("Doe", "a")).await.unwrap();
        assert_eq!(repo.delete(&[created.id]).await.unwrap(), 1);

        let papers = repo.list().await.unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].author, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = repo().await;
        let err = assert_err!(repo.get(99).await);
        assert!(matches!(err, AppError::PaperNotFound { id: 99 }));
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_identity() {
        let repo = repo().await;
        let created = repo
            .create(NewPaper {
                author: "Doe".into(),
                title: "Old".into(),
                citation_count: Some(3),
                note: "note".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                created.id,
                PaperPatch {
                    author: Some("Someone Else".into()),
                    title: Some("New".into()),
                    citation_count: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.code, "D1");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.author, "Someone Else");
        assert_eq!(updated.title, "New");
        assert_eq!(updated.citation_count, None);
        assert_eq!(updated.note, "note");
        assert_eq!(repo.get(created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_keywords_and_reset() {
        let repo = repo().await;
        let created = repo.create(paper("Doe", "note")).await.unwrap();
        assert!(!created.has_keywords());

        let tagged = repo
            .update(created.id, PaperPatch::keywords(vec!["memory".into(), "rust".into()]))
            .await
            .unwrap();
        assert_eq!(tagged.keywords, Some(vec!["memory".to_string(), "rust".to_string()]));

        let reset = repo
            .update(created.id, PaperPatch::keywords(Vec::new()))
            .await
            .unwrap();
        assert_eq!(reset.keywords, None);
    }

    #[tokio::test]
    async fn test_empty_update_returns_record() {
        let repo = repo().await;
        let created = repo.create(paper("Doe", "note")).await.unwrap();
        let same = repo.update(created.id, PaperPatch::default()).await.unwrap();
        assert_eq!(same, created);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = repo().await;
        let err = assert_err!(
            repo.update(5, PaperPatch { title: Some("x".into()), ..Default::default() })
                .await
        );
        assert!(matches!(err, AppError::PaperNotFound { id: 5 }));
    }

    #[tokio::test]
    async fn test_delete_semantics() {
        let repo = repo().await;
        let a = repo.create(paper("Doe", "a")).await.unwrap();
        let b = repo.create(paper("Roe", "b")).await.unwrap();
        let c = repo.create(paper("Poe", "c")).await.unwrap();

        assert_eq!(repo.delete(&[]).await.unwrap(), 0);
        assert_eq!(repo.delete(&[c.id + 100]).await.unwrap(), 0);
        assert_eq!(repo.delete(&[0, -4]).await.unwrap(), 0);

        assert_eq!(repo.delete(&[a.id, a.id, c.id + 100]).await.unwrap(), 1);
        assert_eq!(repo.delete(&[a.id, b.id]).await.unwrap(), 1);

        let remaining = repo.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, c.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_writers_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("papers.db").display().to_string(),
            max_connections: 4,
        };
        let repo = Repository::new(DbPool::new(&config).await.unwrap());

        let mut tasks = JoinSet::new();
        for i in 0..16 {
            let repo = repo.clone();
            tasks.spawn(async move {
                if i % 4 == 0 {
                    repo.list().await.map(|_| None)
                } else {
                    repo.create(paper("Doe", "n")).await.map(Some)
                }
            });
        }

        let mut codes = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            if let Some(created) = assert_ok!(joined.unwrap()) {
                assert!(codes.insert(created.code.clone()), "duplicate {}", created.code);
            }
        }
        assert_eq!(codes.len(), 12);

        let papers = repo.list().await.unwrap();
        let unique: HashSet<_> = papers.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(unique.len(), papers.len());
    }
}
