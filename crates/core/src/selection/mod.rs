//! Interactive selection cache.
//!
//! Ranked candidates are staged per task until an operator picks one, skips
//! uploaders, asks for a new search, or lets the engine auto-select. Entries
//! expire after a configurable timeout.

mod cache;
mod types;

pub use cache::{PendingClaim, SelectionCache};
pub use types::{
    PendingSelection, SelectionCacheConfig, SelectionError, DEFAULT_MAX_CANDIDATES,
};
