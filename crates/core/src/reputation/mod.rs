//! Uploader reputation.
//!
//! Keeps a durable per-uploader record of download outcomes. Candidates
//! from blocked uploaders are filtered out of search results and trusted
//! uploaders get a ranking bonus.

mod sqlite_store;
mod store;
mod tracker;
mod types;

pub use sqlite_store::SqliteReputationStore;
pub use store::ReputationStore;
pub use tracker::{ReputationTracker, TRUSTED_SCORE_BONUS};
pub use types::*;
