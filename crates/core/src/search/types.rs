use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::CandidateResponse;
use crate::quality::QualityInfo;
use crate::selector::FileSelection;

/// A response with its ranking breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub response: CandidateResponse,
    /// Total ranking score (quality + reputation + availability).
    pub score: i64,
    /// Average quality score of the audio files.
    pub quality_score: i64,
    pub reputation_bonus: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_quality: Option<QualityInfo>,
}

impl RankedCandidate {
    pub fn username(&self) -> &str {
        &self.response.username
    }
}

/// Why an attempt did not produce a selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("search submission failed: {0}")]
    SubmitFailed(String),

    #[error("no usable candidates")]
    NoCandidates,

    #[error("no candidate produced a valid file selection")]
    NoValidSelection,

    #[error("reputation lookup failed: {0}")]
    Reputation(String),
}

/// A successful attempt.
#[derive(Debug, Clone)]
pub struct SearchSuccess {
    /// The response the selection was made from.
    pub response: CandidateResponse,
    pub search_id: String,
    pub selection: FileSelection,
    /// All usable candidates in ranking order.
    pub ranked: Vec<RankedCandidate>,
    /// The query string that was sent.
    pub query: String,
}

/// Outcome of one search attempt.
#[derive(Debug, Clone)]
pub enum SearchAttemptResult {
    Success(SearchSuccess),
    Failed { reason: FailureReason },
    /// Nothing found, but another attempt is allowed.
    Deferred { reason: FailureReason },
}

impl SearchAttemptResult {
    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            SearchAttemptResult::Success(_) => "success",
            SearchAttemptResult::Failed { .. } => "failed",
            SearchAttemptResult::Deferred { .. } => "deferred",
        }
    }
}
