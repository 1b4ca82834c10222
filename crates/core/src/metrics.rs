//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search orchestration (attempts, polls, duration, candidates)
//! - Uploader reputation (filtering, automatic transitions)
//! - Interactive selections and downloads

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search Metrics
// =============================================================================

/// Search attempts total by result.
pub static SEARCH_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("digger_search_attempts_total", "Total search attempts"),
        &["result"], // "success", "failed", "deferred", "cancelled"
    )
    .expect("valid metric")
});

/// Search attempt duration in seconds.
pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "digger_search_duration_seconds",
            "Duration of a search attempt including polling",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0]),
        &["result"],
    )
    .expect("valid metric")
});

/// Poll requests issued against the search network.
pub static SEARCH_POLLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("digger_search_polls_total", "Search state polls issued")
        .expect("valid metric")
});

/// Candidates remaining after filtering, per attempt.
pub static CANDIDATES_FOUND: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "digger_candidates_found",
            "Number of usable candidates per search attempt",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .expect("valid metric")
});

// =============================================================================
// Reputation Metrics
// =============================================================================

/// Responses dropped because the uploader is blocked.
pub static REPUTATION_FILTERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "digger_reputation_filtered_total",
        "Search responses removed because the uploader is blocked",
    )
    .expect("valid metric")
});

/// Automatic status transitions by target status.
pub static REPUTATION_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "digger_reputation_transitions_total",
            "Automatic uploader status transitions",
        ),
        &["status"], // "trusted", "flagged"
    )
    .expect("valid metric")
});

// =============================================================================
// Selection & Download Metrics
// =============================================================================

/// Pending selections staged for interactive choice.
pub static SELECTIONS_STAGED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "digger_selections_staged_total",
        "Pending selections staged for interactive choice",
    )
    .expect("valid metric")
});

/// Pending selections resolved by action.
pub static SELECTIONS_RESOLVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "digger_selections_resolved_total",
            "Pending selection resolutions",
        ),
        &["action"], // "select", "skip", "retry", "auto_select", "expired"
    )
    .expect("valid metric")
});

/// Downloads enqueued on the network.
pub static DOWNLOADS_ENQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("digger_downloads_enqueued_total", "Downloads enqueued")
        .expect("valid metric")
});

/// Download outcomes observed by the monitor.
pub static DOWNLOAD_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("digger_download_outcomes_total", "Terminal download outcomes"),
        &["outcome"], // "succeeded", "failed", "abandoned"
    )
    .expect("valid metric")
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCH_ATTEMPTS.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(SEARCH_POLLS.clone()),
        Box::new(CANDIDATES_FOUND.clone()),
        // Reputation
        Box::new(REPUTATION_FILTERED.clone()),
        Box::new(REPUTATION_TRANSITIONS.clone()),
        // Selections & downloads
        Box::new(SELECTIONS_STAGED.clone()),
        Box::new(SELECTIONS_RESOLVED.clone()),
        Box::new(DOWNLOADS_ENQUEUED.clone()),
        Box::new(DOWNLOAD_OUTCOMES.clone()),
    ]
}
