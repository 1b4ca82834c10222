//! Reputation storage trait.

use super::types::{ReputationError, ReputationRecord, UserFilter, UserPage, UserStats, UserStatus};

/// Storage for uploader reputation records.
///
/// Usernames passed in are already normalized (see
/// [`normalize_username`](super::normalize_username)).
pub trait ReputationStore: Send + Sync {
    /// Get a record by id.
    fn get(&self, id: &str) -> Result<Option<ReputationRecord>, ReputationError>;

    /// Get a record by username.
    fn get_by_username(&self, username: &str)
        -> Result<Option<ReputationRecord>, ReputationError>;

    /// Get the record for `username`, creating a neutral one if missing.
    fn find_or_create(&self, username: &str) -> Result<ReputationRecord, ReputationError>;

    /// Read-modify-write a record inside a single transaction.
    ///
    /// The record is created first if missing. `update` sees the current
    /// state and mutates it; the result is written back and returned.
    fn upsert_with(
        &self,
        username: &str,
        update: &mut dyn FnMut(&mut ReputationRecord),
    ) -> Result<ReputationRecord, ReputationError>;

    /// Set the status (and optionally notes) of a record.
    ///
    /// Returns `None` if no record has this id.
    fn update_status(
        &self,
        id: &str,
        status: UserStatus,
        notes: Option<&str>,
    ) -> Result<Option<ReputationRecord>, ReputationError>;

    /// Set the status of many records; returns the number affected.
    fn bulk_update_status(&self, ids: &[String], status: UserStatus)
        -> Result<usize, ReputationError>;

    /// Delete a record. Returns whether it existed.
    fn delete(&self, id: &str) -> Result<bool, ReputationError>;

    /// Usernames currently in `status`.
    fn usernames_with_status(&self, status: UserStatus) -> Result<Vec<String>, ReputationError>;

    /// List records, most recently seen first.
    fn list(&self, filter: &UserFilter) -> Result<UserPage, ReputationError>;

    /// Record counts by status.
    fn stats(&self) -> Result<UserStats, ReputationError>;
}
