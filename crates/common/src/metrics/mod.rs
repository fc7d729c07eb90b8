//! Metrics and observability utilities
//!
//! Prometheus-style counters and histograms for the note pipeline.
//! Nothing is exported unless the binary installs a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Literature Desk metrics
pub const METRICS_PREFIX: &str = "litdesk";

/// Buckets for LLM call latency (model calls are slow)
pub const LLM_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_notes_created_total", METRICS_PREFIX),
        Unit::Count,
        "Records created from pasted notes or manual entry"
    );

    describe_counter!(
        format!("{}_papers_deleted_total", METRICS_PREFIX),
        Unit::Count,
        "Records removed by bulk delete"
    );

    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Chat-completion requests by backend and outcome"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chat-completion latency in seconds"
    );

    describe_counter!(
        format!("{}_keyword_jobs_total", METRICS_PREFIX),
        Unit::Count,
        "Keyword post-processing attempts by outcome"
    );

    tracing::info!("Metrics registered");
}

/// Times one chat-completion call
pub struct LlmCallTimer {
    start: Instant,
    backend: String,
}

impl LlmCallTimer {
    pub fn start(backend: &str) -> Self {
        Self {
            start: Instant::now(),
            backend: backend.to_string(),
        }
    }

    /// Record the call outcome and latency
    pub fn finish(self, success: bool) {
        let outcome = if success { "success" } else { "error" };

        counter!(
            format!("{}_llm_requests_total", METRICS_PREFIX),
            "backend" => self.backend.clone(),
            "outcome" => outcome
        )
        .increment(1);

        histogram!(
            format!("{}_llm_duration_seconds", METRICS_PREFIX),
            "backend" => self.backend
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Source of a newly created record
pub fn record_note_created(source: &'static str) {
    counter!(
        format!("{}_notes_created_total", METRICS_PREFIX),
        "source" => source
    )
    .increment(1);
}

pub fn record_papers_deleted(count: u64) {
    counter!(format!("{}_papers_deleted_total", METRICS_PREFIX)).increment(count);
}

pub fn record_keyword_job(outcome: &'static str) {
    counter!(
        format!("{}_keyword_jobs_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}
