use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::query::SearchContext;
use crate::search::{RankedCandidate, SearchConfig};

/// Default number of candidates kept per pending selection.
pub const DEFAULT_MAX_CANDIDATES: usize = 15;

/// Errors from the selection cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("No pending selection for task {0}")]
    NotFound(String),

    #[error("Pending selection for task {0} has expired")]
    Expired(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCacheConfig {
    /// Time a pending selection stays valid. `None` keeps entries until resolved.
    pub timeout: Option<Duration>,
    pub max_candidates: usize,
}

impl Default for SelectionCacheConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(3600)),
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

/// Ranked candidates awaiting an operator decision.
///
/// Keeps the search inputs so the search can be re-run on request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingSelection {
    pub task_id: String,
    pub context: SearchContext,
    pub query: String,
    pub search_config: SearchConfig,
    /// Best first.
    pub candidates: Vec<RankedCandidate>,
    pub created_at: DateTime<Utc>,
    /// Set when staged; `None` means no expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl PendingSelection {
    pub fn new(
        task_id: impl Into<String>,
        context: SearchContext,
        query: impl Into<String>,
        search_config: SearchConfig,
        candidates: Vec<RankedCandidate>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            context,
            query: query.into(),
            search_config,
            candidates,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Candidate offered by `username` (case-insensitive).
    pub fn candidate(&self, username: &str) -> Option<&RankedCandidate> {
        self.candidates
            .iter()
            .find(|c| c.username().eq_ignore_ascii_case(username))
    }

    /// Remove the candidate offered by `username`; returns whether one was removed.
    pub fn remove_candidate(&mut self, username: &str) -> bool {
        let before = self.candidates.len();
        self.candidates
            .retain(|c| !c.username().eq_ignore_ascii_case(username));
        self.candidates.len() != before
    }
}
