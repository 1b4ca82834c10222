use thiserror::Error;

use crate::network::NetworkError;
use crate::reputation::ReputationError;
use crate::selection::SelectionError;

/// Errors surfaced by the acquisition engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Task or uploader absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Pending selection past its TTL.
    #[error("Selection expired for task {0}")]
    Expired(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network failure: {0}")]
    NetworkFailure(#[from] NetworkError),

    /// Search finished with nothing usable after filtering.
    #[error("No usable candidates for task {0}")]
    NoCandidates(String),

    /// Cancelled while searching or waiting to retry.
    #[error("Cancelled")]
    Cancelled,

    #[error("Reputation store error: {0}")]
    Reputation(#[from] ReputationError),
}

impl EngineError {
    /// HTTP status a web layer would report for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::NotFound(_) => 404,
            EngineError::Expired(_) => 410,
            EngineError::InvalidInput(_) => 400,
            EngineError::NetworkFailure(_) => 502,
            EngineError::NoCandidates(_) => 404,
            EngineError::Cancelled => 499,
            EngineError::Reputation(_) => 500,
        }
    }
}

impl From<SelectionError> for EngineError {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::NotFound(task_id) => EngineError::NotFound(task_id),
            SelectionError::Expired(task_id) => EngineError::Expired(task_id),
        }
    }
}
