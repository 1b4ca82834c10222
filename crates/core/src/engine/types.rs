use serde::Serialize;

use crate::network::DownloadJob;
use crate::reputation::SuccessOutcome;
use crate::search::FailureReason;
use crate::selection::PendingSelection;
use crate::selector::FileSelection;

/// Operator decision on a pending selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    /// Download from `username`, optionally restricted to one directory.
    Select {
        username: String,
        directory: Option<String>,
    },
    /// Drop one uploader from the candidates.
    Skip { username: String },
    /// Discard the candidates and search again, optionally with a new query.
    RetrySearch { query: Option<String> },
    /// Take the best remaining candidate.
    AutoSelect,
}

impl SelectionAction {
    /// Label used for metrics and events.
    pub fn label(&self) -> &'static str {
        match self {
            SelectionAction::Select { .. } => "select",
            SelectionAction::Skip { .. } => "skip",
            SelectionAction::RetrySearch { .. } => "retry",
            SelectionAction::AutoSelect => "auto_select",
        }
    }
}

/// A download handed to the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnqueuedDownload {
    pub task_id: String,
    pub job: DownloadJob,
    pub selection: FileSelection,
}

/// Result of [`AcquisitionEngine::search_and_maybe_select`](super::AcquisitionEngine::search_and_maybe_select).
#[derive(Debug, Clone)]
pub enum AcquisitionOutcome {
    /// The best candidate was queued for download.
    Enqueued {
        download: EnqueuedDownload,
        attempts: u32,
    },
    /// Candidates were staged for an operator.
    AwaitingSelection {
        pending: PendingSelection,
        attempts: u32,
    },
    /// Every attempt ended without a valid selection.
    Failed {
        reason: FailureReason,
        attempts: u32,
    },
}

impl AcquisitionOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            AcquisitionOutcome::Enqueued { attempts, .. }
            | AcquisitionOutcome::AwaitingSelection { attempts, .. }
            | AcquisitionOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Result of resolving a pending selection.
#[derive(Debug, Clone)]
pub enum Resolution {
    Enqueued(EnqueuedDownload),
    /// The uploader was removed; the entry is gone when none remain.
    Skipped { remaining: usize },
    /// Outcome of the repeated search.
    Searched(AcquisitionOutcome),
}

/// Download outcome reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(SuccessOutcome),
    Failure,
}
