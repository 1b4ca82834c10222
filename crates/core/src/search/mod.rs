//! Search orchestration.
//!
//! A search attempt submits a query to the network, polls until it
//! completes or a deadline passes, filters and ranks the responses, and
//! picks the first candidate that yields a valid file selection.

mod config;
mod orchestrator;
mod ranking;
mod types;

pub use config::{RetryPolicy, SearchConfig, MIN_FILES_ALBUM, MIN_FILES_TRACK};
pub use orchestrator::SearchOrchestrator;
pub use ranking::{
    audio_files, availability_bonus, rank_candidates, score_response, FREE_SLOT_BONUS,
    SPEED_BONUS_CAP,
};
pub use types::{FailureReason, RankedCandidate, SearchAttemptResult, SearchSuccess};
