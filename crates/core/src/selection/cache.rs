//! Pending selections keyed by task id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics;

use super::types::{PendingSelection, SelectionCacheConfig, SelectionError};

/// How long an expiry is remembered after it happened.
const TOMBSTONE_RETENTION: Duration = Duration::from_secs(24 * 3600);

/// Contents of a task's slot.
///
/// A detached slot has been removed from the map; callers that locked it
/// must look the task up again.
#[derive(Debug, Default)]
struct SlotState {
    entry: Option<PendingSelection>,
    detached: bool,
}

type Slot = Arc<AsyncMutex<SlotState>>;

/// Interactive selection cache.
///
/// Each task has its own slot behind an async mutex, so resolutions of one
/// task are serialized without blocking others. Expired entries are purged
/// lazily on access and by [`SelectionCache::sweep`].
#[derive(Debug)]
pub struct SelectionCache {
    config: SelectionCacheConfig,
    slots: Mutex<HashMap<String, Slot>>,
    /// Expiry time of recently expired tasks.
    tombstones: Mutex<HashMap<String, DateTime<Utc>>>,
}

/// Exclusive hold on a pending selection.
///
/// Dropping the claim puts the entry back (with any changes made through
/// [`PendingClaim::pending_mut`]); [`PendingClaim::consume`] removes it.
pub struct PendingClaim<'a> {
    cache: &'a SelectionCache,
    slot: Slot,
    guard: OwnedMutexGuard<SlotState>,
    entry: PendingSelection,
    consumed: bool,
}

impl std::fmt::Debug for PendingClaim<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingClaim")
            .field("task_id", &self.entry.task_id)
            .field("candidates", &self.entry.candidates.len())
            .finish()
    }
}

impl PendingClaim<'_> {
    pub fn pending(&self) -> &PendingSelection {
        &self.entry
    }

    pub fn pending_mut(&mut self) -> &mut PendingSelection {
        &mut self.entry
    }

    /// Resolve the entry: it is removed from the cache.
    pub fn consume(mut self) -> PendingSelection {
        self.consumed = true;
        self.cache.detach(&self.entry.task_id, &self.slot, &mut self.guard);
        self.entry.clone()
    }
}

impl Drop for PendingClaim<'_> {
    fn drop(&mut self) {
        if !self.consumed {
            self.guard.entry = Some(self.entry.clone());
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SelectionCache {
    pub fn new(config: SelectionCacheConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
            tombstones: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SelectionCacheConfig {
        &self.config
    }

    /// Store `pending` for its task, replacing any existing entry.
    ///
    /// Candidates are truncated to the configured cap and the expiry is
    /// computed from `created_at`.
    pub async fn stage(&self, mut pending: PendingSelection) -> PendingSelection {
        pending.candidates.truncate(self.config.max_candidates);
        pending.expires_at = self.config.timeout.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .map(|ttl| pending.created_at + ttl)
        });

        let task_id = pending.task_id.clone();
        let superseded = loop {
            let slot = {
                let mut slots = lock(&self.slots);
                slots
                    .entry(task_id.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(SlotState::default())))
                    .clone()
            };

            let mut guard = slot.lock().await;
            if guard.detached {
                continue;
            }
            lock(&self.tombstones).remove(&task_id);
            break guard.entry.replace(pending.clone()).is_some();
        };

        metrics::SELECTIONS_STAGED.inc();
        info!(
            "Staged {} candidates for task {}{}",
            pending.candidates.len(),
            task_id,
            if superseded { " (superseded)" } else { "" }
        );

        pending
    }

    /// Current entry for `task_id`, if present and unexpired.
    pub async fn get(&self, task_id: &str) -> Option<PendingSelection> {
        loop {
            let slot = self.slot(task_id)?;
            let mut guard = slot.lock().await;
            if guard.detached {
                continue;
            }

            if guard.entry.as_ref().map_or(false, PendingSelection::is_expired) {
                self.expire(task_id, &slot, &mut guard);
                return None;
            }
            return guard.entry.clone();
        }
    }

    /// Take exclusive hold of the entry for `task_id`.
    ///
    /// Waits for any other claim on the same task. An expired entry is purged
    /// and reported as [`SelectionError::Expired`].
    pub async fn claim(&self, task_id: &str) -> Result<PendingClaim<'_>, SelectionError> {
        let (slot, mut guard) = loop {
            let Some(slot) = self.slot(task_id) else {
                return Err(self.missing(task_id));
            };
            let guard = slot.clone().lock_owned().await;
            if !guard.detached {
                break (slot, guard);
            }
        };

        if guard.entry.as_ref().map_or(false, PendingSelection::is_expired) {
            self.expire(task_id, &slot, &mut guard);
            return Err(SelectionError::Expired(task_id.to_string()));
        }
        let Some(entry) = guard.entry.take() else {
            return Err(self.missing(task_id));
        };

        Ok(PendingClaim {
            cache: self,
            slot,
            guard,
            entry,
            consumed: false,
        })
    }

    /// Purge entries expired at `now` and forget old tombstones.
    ///
    /// Returns the number of entries purged. Slots held by a claim are
    /// skipped.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let slots: Vec<(String, Slot)> = lock(&self.slots)
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut purged = 0;
        for (task_id, slot) in slots {
            let Ok(mut guard) = slot.try_lock() else {
                continue;
            };
            if guard.detached {
                continue;
            }
            if guard.entry.as_ref().map_or(false, |p| p.is_expired_at(now)) {
                self.expire(&task_id, &slot, &mut guard);
                purged += 1;
            } else {
                debug!(task_id = %task_id, "Pending selection still valid");
            }
        }

        let retention = chrono::Duration::from_std(TOMBSTONE_RETENTION)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        lock(&self.tombstones).retain(|_, expired_at| now - *expired_at < retention);

        purged
    }

    /// Sweep every `interval` until `cancel` fires.
    pub async fn run_sweeper(&self, interval: Duration, cancel: CancellationToken) {
        info!(interval_secs = interval.as_secs(), "Selection sweeper started");

        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Selection sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let purged = self.sweep(Utc::now());
                    if purged > 0 {
                        info!(purged, "Purged expired pending selections");
                    }
                }
            }
        }
    }

    /// Task ids with a staged entry, expired or not.
    pub fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.slots).keys().cloned().collect();
        ids.sort();
        ids
    }

    fn slot(&self, task_id: &str) -> Option<Slot> {
        lock(&self.slots).get(task_id).cloned()
    }

    fn missing(&self, task_id: &str) -> SelectionError {
        if lock(&self.tombstones).contains_key(task_id) {
            SelectionError::Expired(task_id.to_string())
        } else {
            SelectionError::NotFound(task_id.to_string())
        }
    }

    /// Purge the expired entry of a locked slot and remember the expiry.
    fn expire(&self, task_id: &str, slot: &Slot, state: &mut SlotState) {
        let expired_at = state
            .entry
            .as_ref()
            .and_then(|p| p.expires_at)
            .unwrap_or_else(Utc::now);
        lock(&self.tombstones).insert(task_id.to_string(), expired_at);
        self.detach(task_id, slot, state);

        metrics::SELECTIONS_RESOLVED
            .with_label_values(&["expired"])
            .inc();
        info!("Pending selection for task {} expired", task_id);
    }

    /// Empty a locked slot and drop it from the map.
    ///
    /// Must be called with the slot's guard held, so anyone waiting on the
    /// slot sees it detached and looks the task up again.
    fn detach(&self, task_id: &str, slot: &Slot, state: &mut SlotState) {
        state.entry = None;
        state.detached = true;

        let mut slots = lock(&self.slots);
        if slots
            .get(task_id)
            .map_or(false, |current| Arc::ptr_eq(current, slot))
        {
            slots.remove(task_id);
        }
    }
}
