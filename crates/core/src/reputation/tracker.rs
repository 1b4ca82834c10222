//! Uploader reputation state machine.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::metrics;
use crate::network::CandidateResponse;

use super::store::ReputationStore;
use super::types::{
    normalize_username, ImportSummary, ReputationError, ReputationRecord, ReputationSettings,
    SuccessOutcome, UserExport, UserFilter, UserImport, UserPage, UserStats, UserStatus,
};

/// Bonus added to the ranking score of trusted uploaders.
pub const TRUSTED_SCORE_BONUS: i64 = 100;

/// Tracks uploader outcomes and gates candidates by trust.
///
/// Automatic transitions only ever leave `neutral` (to `trusted` or
/// `flagged`). Blocking is always a manual action.
pub struct ReputationTracker {
    store: Arc<dyn ReputationStore>,
    settings: ReputationSettings,
}

impl ReputationTracker {
    pub fn new(store: Arc<dyn ReputationStore>, settings: ReputationSettings) -> Self {
        Self { store, settings }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn settings(&self) -> &ReputationSettings {
        &self.settings
    }

    /// Record a successful download from `username`.
    pub fn record_success(
        &self,
        username: &str,
        outcome: SuccessOutcome,
    ) -> Result<(), ReputationError> {
        if !self.settings.enabled {
            return Ok(());
        }

        let key = normalize_username(username);
        let settings = &self.settings;
        let quality = outcome.quality_score.min(100);
        let mut became_trusted = false;

        let record = self.store.upsert_with(&key, &mut |r| {
            let previous = r.success_count as u64;
            let count = previous + 1;

            r.average_speed = if previous > 0 {
                running_mean(r.average_speed, previous, outcome.speed)
            } else {
                outcome.speed
            };

            if settings.track_quality {
                r.quality_score = if previous > 0 {
                    running_mean(r.quality_score as u64, previous, quality as u64) as u32
                } else {
                    quality
                };
            }

            r.success_count = count.min(u32::MAX as u64) as u32;
            r.total_bytes = r.total_bytes.saturating_add(outcome.bytes);
            r.last_seen_at = Utc::now();

            became_trusted = false;
            if r.status == UserStatus::Neutral && r.success_count >= settings.auto_trust_threshold
            {
                r.status = UserStatus::Trusted;
                became_trusted = true;
            }
        })?;

        if became_trusted {
            info!(
                username = %key,
                success_count = record.success_count,
                "Auto-trusting uploader"
            );
            metrics::REPUTATION_TRANSITIONS
                .with_label_values(&["trusted"])
                .inc();
        }

        debug!(
            username = %key,
            success_count = record.success_count,
            bytes = outcome.bytes,
            speed = outcome.speed,
            quality_score = quality,
            "Recorded download success"
        );
        Ok(())
    }

    /// Record a failed download from `username`.
    pub fn record_failure(&self, username: &str) -> Result<(), ReputationError> {
        if !self.settings.enabled {
            return Ok(());
        }

        let key = normalize_username(username);
        let threshold = self.settings.auto_flag_threshold;
        let mut became_flagged = false;

        let record = self.store.upsert_with(&key, &mut |r| {
            r.failure_count = r.failure_count.saturating_add(1);
            r.last_seen_at = Utc::now();

            became_flagged = false;
            if r.status == UserStatus::Neutral && r.failure_count >= threshold {
                r.status = UserStatus::Flagged;
                became_flagged = true;
            }
        })?;

        if became_flagged {
            info!(
                username = %key,
                failure_count = record.failure_count,
                "Auto-flagging uploader"
            );
            metrics::REPUTATION_TRANSITIONS
                .with_label_values(&["flagged"])
                .inc();
        }

        debug!(username = %key, failure_count = record.failure_count, "Recorded download failure");
        Ok(())
    }

    /// Whether `username` is blocked. Always false when disabled.
    pub fn is_blocked(&self, username: &str) -> Result<bool, ReputationError> {
        if !self.settings.enabled {
            return Ok(false);
        }
        Ok(self
            .store
            .get_by_username(&normalize_username(username))?
            .is_some_and(|r| r.status == UserStatus::Blocked))
    }

    /// Ranking bonus for `username`: 100 when trusted, else 0.
    pub fn score_bonus(&self, username: &str) -> Result<i64, ReputationError> {
        if !self.settings.enabled {
            return Ok(0);
        }
        let trusted = self
            .store
            .get_by_username(&normalize_username(username))?
            .is_some_and(|r| r.status == UserStatus::Trusted);
        Ok(if trusted { TRUSTED_SCORE_BONUS } else { 0 })
    }

    /// Drop responses from blocked uploaders, preserving order.
    pub fn filter_by_reputation(
        &self,
        responses: Vec<CandidateResponse>,
    ) -> Result<Vec<CandidateResponse>, ReputationError> {
        if !self.settings.enabled {
            return Ok(responses);
        }

        let blocked: HashSet<String> = self
            .store
            .usernames_with_status(UserStatus::Blocked)?
            .into_iter()
            .map(|u| u.to_lowercase())
            .collect();

        if blocked.is_empty() {
            return Ok(responses);
        }

        let original = responses.len();
        let filtered: Vec<CandidateResponse> = responses
            .into_iter()
            .filter(|r| {
                let is_blocked = blocked.contains(&normalize_username(&r.username));
                if is_blocked {
                    debug!(username = %r.username, "Filtering blocked uploader from results");
                }
                !is_blocked
            })
            .collect();

        let removed = original - filtered.len();
        if removed > 0 {
            info!(
                original,
                filtered = filtered.len(),
                removed,
                "Filtered blocked uploaders from search results"
            );
            metrics::REPUTATION_FILTERED.inc_by(removed as u64);
        }

        Ok(filtered)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Get the record for `username`, creating it if needed.
    pub fn find_or_create(&self, username: &str) -> Result<ReputationRecord, ReputationError> {
        self.store.find_or_create(&normalize_username(username))
    }

    pub fn get(&self, id: &str) -> Result<Option<ReputationRecord>, ReputationError> {
        self.store.get(id)
    }

    pub fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ReputationRecord>, ReputationError> {
        self.store.get_by_username(&normalize_username(username))
    }

    /// Manually set status (and optionally notes).
    pub fn update_status(
        &self,
        id: &str,
        status: UserStatus,
        notes: Option<&str>,
    ) -> Result<ReputationRecord, ReputationError> {
        let record = self
            .store
            .update_status(id, status, notes)?
            .ok_or_else(|| ReputationError::NotFound(id.to_string()))?;

        info!(username = %record.username, status = %status, "Updated uploader status");
        Ok(record)
    }

    /// Return an uploader to neutral.
    pub fn reset(&self, id: &str) -> Result<ReputationRecord, ReputationError> {
        self.update_status(id, UserStatus::Neutral, None)
    }

    pub fn delete(&self, id: &str) -> Result<bool, ReputationError> {
        self.store.delete(id)
    }

    pub fn list(&self, filter: &UserFilter) -> Result<UserPage, ReputationError> {
        self.store.list(filter)
    }

    pub fn stats(&self) -> Result<UserStats, ReputationError> {
        self.store.stats()
    }

    pub fn bulk_update_status(
        &self,
        ids: &[String],
        status: UserStatus,
    ) -> Result<usize, ReputationError> {
        let affected = self.store.bulk_update_status(ids, status)?;
        info!(count = affected, status = %status, "Bulk updated uploader status");
        Ok(affected)
    }

    /// Usernames of every non-neutral uploader, by status.
    pub fn export_users(&self) -> Result<UserExport, ReputationError> {
        Ok(UserExport {
            trusted: self.store.usernames_with_status(UserStatus::Trusted)?,
            blocked: self.store.usernames_with_status(UserStatus::Blocked)?,
            flagged: self.store.usernames_with_status(UserStatus::Flagged)?,
        })
    }

    /// Create or update uploaders from exported lists.
    ///
    /// Lists apply in the order trusted, blocked, flagged. Users already in
    /// the target status are left alone and not counted.
    pub fn import_users(&self, data: &UserImport) -> Result<ImportSummary, ReputationError> {
        let mut summary = ImportSummary::default();

        for (usernames, status) in [
            (&data.trusted, UserStatus::Trusted),
            (&data.blocked, UserStatus::Blocked),
            (&data.flagged, UserStatus::Flagged),
        ] {
            for username in usernames {
                let key = normalize_username(username);
                if key.is_empty() {
                    continue;
                }

                match self.store.get_by_username(&key)? {
                    Some(existing) if existing.status == status => {}
                    Some(existing) => {
                        self.store.update_status(&existing.id, status, None)?;
                        summary.updated += 1;
                    }
                    None => {
                        self.store.upsert_with(&key, &mut |r| r.status = status)?;
                        summary.imported += 1;
                    }
                }
            }
        }

        info!(
            imported = summary.imported,
            updated = summary.updated,
            "Imported uploader lists"
        );
        Ok(summary)
    }
}

/// Count-weighted running mean, rounded to nearest.
fn running_mean(mean: u64, count: u64, value: u64) -> u64 {
    let total = mean as f64 * count as f64 + value as f64;
    (total / (count + 1) as f64).round() as u64
}
