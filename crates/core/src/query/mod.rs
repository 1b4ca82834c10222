//! Search query building.
//!
//! Turns a [`SearchContext`] into a primary query plus fallbacks, and
//! produces the simplified variants used on retry.

mod builder;
mod types;

pub use builder::{query_for_attempt, simplify, QueryBuilder};
pub use types::{BuiltQuery, QueryTemplates, SearchContext, SearchKind};
