//! Common test utilities for engine integration tests.
//!
//! Builds an [`AcquisitionEngine`] wired to mock network and download
//! doubles and an on-disk reputation store in a temporary directory.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use digger_core::{
    config::MonitorConfig,
    reputation::ReputationSettings,
    selection::SelectionCacheConfig,
    testing::{MockDownloadRunner, MockSearchNetwork},
    AcquisitionEngine, DownloadMonitor, EventBus, ReputationTracker, SearchConfig,
    SelectionCache, SelectionMode, SqliteReputationStore,
};

/// Re-export fixtures for test convenience
pub use digger_core::testing::fixtures;

/// Knobs for building a fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub mode: SelectionMode,
    pub reputation: ReputationSettings,
    pub selection_timeout: Option<Duration>,
    pub max_candidates: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::Auto,
            reputation: ReputationSettings {
                enabled: true,
                ..Default::default()
            },
            selection_timeout: Some(Duration::from_secs(3600)),
            max_candidates: 15,
        }
    }
}

/// Engine plus the doubles behind it.
pub struct TestFixture {
    pub engine: AcquisitionEngine,
    /// Mock search network - configure responses and completion
    pub network: Arc<MockSearchNetwork>,
    /// Mock download runner - control job states
    pub downloads: Arc<MockDownloadRunner>,
    pub reputation: Arc<ReputationTracker>,
    pub events: EventBus,
    /// Temporary directory holding the reputation database
    pub temp_dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    pub fn interactive() -> Self {
        Self::with_config(TestConfig {
            mode: SelectionMode::Interactive,
            ..Default::default()
        })
    }

    pub fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteReputationStore::new(&temp_dir.path().join("reputation.db"))
            .expect("Failed to create reputation store");

        let network = Arc::new(MockSearchNetwork::new());
        let downloads = Arc::new(MockDownloadRunner::new());
        let reputation = Arc::new(ReputationTracker::new(
            Arc::new(store),
            test_config.reputation,
        ));
        let events = EventBus::new();

        let monitor = Arc::new(DownloadMonitor::new(
            downloads.clone(),
            reputation.clone(),
            events.clone(),
            MonitorConfig::default(),
        ));
        let selections = Arc::new(SelectionCache::new(SelectionCacheConfig {
            timeout: test_config.selection_timeout,
            max_candidates: test_config.max_candidates,
        }));

        let engine = AcquisitionEngine::new(
            network.clone(),
            downloads.clone(),
            reputation.clone(),
            selections,
            monitor,
            events.clone(),
            test_config.mode,
        );

        Self {
            engine,
            network,
            downloads,
            reputation,
            events,
            temp_dir,
        }
    }
}

/// Search settings with short timings so tests run quickly.
pub fn fast_search_config() -> SearchConfig {
    SearchConfig {
        search_timeout_ms: 200,
        max_wait_ms: 400,
        poll_interval_ms: 10,
        retry: digger_core::search::RetryPolicy {
            delay_ms: 10,
            ..Default::default()
        },
        ..Default::default()
    }
}
