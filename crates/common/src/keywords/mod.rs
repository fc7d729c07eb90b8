//! Background keyword post-processing
//!
//! Records that have a note but no keywords are tagged one at a time:
//! 1. A cycle lists the store and queues eligible ids in list order
//! 2. The first id that can be claimed in the in-flight set is processed
//! 3. Keywords are generated and written back; failures are only logged
//!
//! The [`KeywordWorker`] runs cycles back to back while there is work and
//! otherwise sleeps until triggered or the poll interval passes.

use crate::db::{PaperPatch, PaperRecord, Repository};
use crate::errors::{AppError, Result};
use crate::extraction::KeywordExtractor;
use crate::metrics::record_keyword_job;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, instrument, warn};

/// Ids currently being processed, shared with readers such as the timeline
#[derive(Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<i64>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.lock().contains(&id)
    }

    pub fn snapshot(&self) -> HashSet<i64> {
        self.lock().clone()
    }

    /// Claim `id`; `None` when it is already in flight
    pub fn try_claim(&self, id: i64) -> Option<InFlightGuard> {
        if !self.lock().insert(id) {
            return None;
        }
        Some(InFlightGuard {
            ids: Arc::clone(&self.ids),
            id,
        })
    }
}

/// Releases its id on drop, whatever the outcome
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<i64>>>,
    id: i64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Wakes the worker early, e.g. after a note is saved
#[derive(Clone, Default)]
pub struct KeywordTrigger {
    notify: Arc<Notify>,
}

impl KeywordTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cycle. A trigger fired while the worker is busy is kept
    /// and consumed by its next wait.
    pub fn notify(&self) {
        self.notify.notify_one();
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing eligible
    Idle,
    Processed { id: i64, keywords: usize },
    Failed { id: Option<i64> },
}

/// Ids that still need keywords, in list order
pub fn eligible_ids(records: &[PaperRecord], in_flight: &InFlight) -> Vec<i64> {
    records
        .iter()
        .filter(|r| !r.note.trim().is_empty() && !r.has_keywords() && !in_flight.contains(r.id))
        .map(|r| r.id)
        .collect()
}

/// Runs single keyword cycles against the store
pub struct KeywordProcessor {
    repository: Repository,
    extractor: KeywordExtractor,
    in_flight: InFlight,
}

impl KeywordProcessor {
    pub fn new(repository: Repository, extractor: KeywordExtractor, in_flight: InFlight) -> Self {
        Self {
            repository,
            extractor,
            in_flight,
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Process at most one eligible record
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleOutcome {
        let records = match self.repository.list().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Keyword scan could not list records");
                record_keyword_job("failed");
                return CycleOutcome::Failed { id: None };
            }
        };

        let queue = eligible_ids(&records, &self.in_flight);
        let claimed = queue
            .into_iter()
            .find_map(|id| self.in_flight.try_claim(id).map(|guard| (id, guard)));

        let Some((id, _guard)) = claimed else {
            debug!("No records waiting for keywords");
            return CycleOutcome::Idle;
        };
        let Some(record) = records.iter().find(|r| r.id == id) else {
            return CycleOutcome::Idle;
        };

        match self.process(record).await {
            Ok(count) => {
                info!(paper_id = id, code = %record.code, keywords = count, "Keywords stored");
                record_keyword_job("processed");
                CycleOutcome::Processed { id, keywords: count }
            }
            Err(e) => {
                warn!(paper_id = id, error = %e, "Keyword extraction failed");
                record_keyword_job("failed");
                CycleOutcome::Failed { id: Some(id) }
            }
        }
    }

    async fn process(&self, record: &PaperRecord) -> Result<usize> {
        let keywords = self.extractor.extract(record).await?;
        if keywords.is_empty() {
            return Err(AppError::Internal {
                message: "model returned no usable keywords".to_string(),
            });
        }

        // Keywords set by an edit while the model was working win
        if self.repository.get(record.id).await?.has_keywords() {
            debug!(paper_id = record.id, "Keywords set meanwhile, discarding result");
            return Ok(0);
        }

        let count = keywords.len();
        self.repository
            .update(record.id, PaperPatch::keywords(keywords))
            .await?;
        Ok(count)
    }
}

/// Long-running loop driving a [`KeywordProcessor`]
pub struct KeywordWorker {
    processor: Arc<KeywordProcessor>,
    trigger: KeywordTrigger,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl KeywordWorker {
    pub fn new(
        processor: Arc<KeywordProcessor>,
        trigger: KeywordTrigger,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            processor,
            trigger,
            poll_interval,
            shutdown,
        }
    }

    /// Run until shutdown is signalled.
    ///
    /// Shutdown is only observed between cycles; a cycle that has started
    /// always runs to completion.
    pub async fn run(mut self) {
        info!(poll_secs = self.poll_interval.as_secs(), "Keyword worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            if let CycleOutcome::Processed { .. } = self.processor.run_cycle().await {
                continue;
            }

            tokio::select! {
                _ = self.trigger.notified() => {
                    debug!("Keyword worker triggered");
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Keyword worker stopped");
    }
}
