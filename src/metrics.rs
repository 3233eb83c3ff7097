//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic; the embedding application decides how
//! to expose `REGISTRY`.

use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Store Metrics
    pub static ref STORE_COMMITS_TOTAL: IntCounter = IntCounter::new(
        "fedisync_store_commits_total",
        "Total number of committed write transactions"
    ).expect("metric can be created");
    pub static ref STORE_COMMIT_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "fedisync_store_commit_duration_seconds",
            "Time a write transaction held the write queue"
        ).buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).expect("metric can be created");

    // Merge Metrics
    pub static ref MERGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedisync_merges_total", "Total number of merged remote entities"),
        &["entity", "outcome"]
    ).expect("metric can be created");
    pub static ref MERGE_CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedisync_merge_cache_hits_total", "Records resolved from the request-scoped merge cache"),
        &["entity"]
    ).expect("metric can be created");

    // Mutation Metrics
    pub static ref TOGGLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedisync_toggles_total", "Total number of optimistic toggles"),
        &["kind", "outcome"]
    ).expect("metric can be created");
    pub static ref ROLLBACK_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedisync_rollback_failures_total", "Rollbacks that could not be written"),
        &["kind"]
    ).expect("metric can be created");

    // Feed Metrics
    pub static ref FEED_PAGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedisync_feed_pages_total", "Total number of ingested feed pages"),
        &["feed"]
    ).expect("metric can be created");
    pub static ref FEED_ENTRIES_ATTACHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedisync_feed_entries_attached_total", "Feed entries newly attached"),
        &["feed"]
    ).expect("metric can be created");

    // Poll Metrics
    pub static ref POLL_VOTES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedisync_poll_votes_total", "Total number of poll vote attempts"),
        &["outcome"]
    ).expect("metric can be created");
}

/// Record a committed write transaction
pub fn observe_commit(elapsed: Duration) {
    STORE_COMMITS_TOTAL.inc();
    STORE_COMMIT_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

pub fn record_merge(entity: &str, outcome: &str) {
    MERGES_TOTAL.with_label_values(&[entity, outcome]).inc();
}

pub fn record_toggle(kind: &str, outcome: &str) {
    TOGGLES_TOTAL.with_label_values(&[kind, outcome]).inc();
}

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(STORE_COMMITS_TOTAL.clone()))
            .expect("STORE_COMMITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(STORE_COMMIT_DURATION_SECONDS.clone()))
            .expect("STORE_COMMIT_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(MERGES_TOTAL.clone()))
            .expect("MERGES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MERGE_CACHE_HITS_TOTAL.clone()))
            .expect("MERGE_CACHE_HITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(TOGGLES_TOTAL.clone()))
            .expect("TOGGLES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ROLLBACK_FAILURES_TOTAL.clone()))
            .expect("ROLLBACK_FAILURES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(FEED_PAGES_TOTAL.clone()))
            .expect("FEED_PAGES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(FEED_ENTRIES_ATTACHED_TOTAL.clone()))
            .expect("FEED_ENTRIES_ATTACHED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(POLL_VOTES_TOTAL.clone()))
            .expect("POLL_VOTES_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
