//! Acquisition engine facade.
//!
//! Drives searches with retries, then either enqueues the best candidate or
//! stages the ranked candidates for an operator, and resolves those staged
//! selections.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SelectionMode;
use crate::events::{EngineEvent, EventBus, EventEnvelope};
use crate::metrics;
use crate::monitor::DownloadMonitor;
use crate::network::{DownloadRunner, SearchNetwork};
use crate::query::{query_for_attempt, BuiltQuery, QueryBuilder, SearchContext};
use crate::reputation::{ReputationRecord, ReputationTracker};
use crate::search::{
    FailureReason, SearchAttemptResult, SearchConfig, SearchOrchestrator, SearchSuccess,
};
use crate::selection::{PendingSelection, SelectionCache};
use crate::selector::{select_files, FileSelection};

use super::error::EngineError;
use super::types::{AcquisitionOutcome, EnqueuedDownload, Outcome, Resolution, SelectionAction};

/// The acquisition engine.
pub struct AcquisitionEngine {
    orchestrator: SearchOrchestrator,
    downloads: Arc<dyn DownloadRunner>,
    reputation: Arc<ReputationTracker>,
    selections: Arc<SelectionCache>,
    monitor: Arc<DownloadMonitor>,
    events: EventBus,
    mode: SelectionMode,
    /// Parent of the tokens used for searches the engine starts itself.
    shutdown: CancellationToken,
}

impl std::fmt::Debug for AcquisitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionEngine")
            .field("mode", &self.mode)
            .field("selections", &self.selections)
            .finish()
    }
}

impl AcquisitionEngine {
    pub fn new(
        network: Arc<dyn SearchNetwork>,
        downloads: Arc<dyn DownloadRunner>,
        reputation: Arc<ReputationTracker>,
        selections: Arc<SelectionCache>,
        monitor: Arc<DownloadMonitor>,
        events: EventBus,
        mode: SelectionMode,
    ) -> Self {
        Self {
            orchestrator: SearchOrchestrator::new(network, reputation.clone()),
            downloads,
            reputation,
            selections,
            monitor,
            events,
            mode,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel searches started by `resolve_selection` when `token` fires.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn selections(&self) -> &Arc<SelectionCache> {
        &self.selections
    }

    pub fn monitor(&self) -> &Arc<DownloadMonitor> {
        &self.monitor
    }

    pub fn reputation(&self) -> &Arc<ReputationTracker> {
        &self.reputation
    }

    /// Search for `context`, retrying while attempts remain, then enqueue
    /// the best candidate or stage the candidates, depending on the mode.
    pub async fn search_and_maybe_select(
        &self,
        task_id: &str,
        context: &SearchContext,
        config: &SearchConfig,
        cancel: &CancellationToken,
    ) -> Result<AcquisitionOutcome, EngineError> {
        if task_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("task id is empty".to_string()));
        }
        if context.artist.trim().is_empty() {
            return Err(EngineError::InvalidInput("artist is empty".to_string()));
        }
        config.validate().map_err(EngineError::InvalidInput)?;

        let built = QueryBuilder::new(config.query.clone()).build(context);
        if built.primary.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "no query could be built for {}",
                context.label()
            )));
        }

        info!("Task {} acquiring {}", task_id, context.label());
        self.run_search(task_id, context, &built, config, cancel)
            .await
    }

    /// Pending selection for `task_id`. Expired entries are reported absent.
    pub async fn get_pending_selection(
        &self,
        task_id: &str,
    ) -> Result<PendingSelection, EngineError> {
        self.selections
            .get(task_id)
            .await
            .ok_or_else(|| EngineError::NotFound(task_id.to_string()))
    }

    /// Apply an operator decision to the pending selection of `task_id`.
    ///
    /// Decisions on the same task are serialized; a pending selection is
    /// resolved at most once and later callers get `NotFound`.
    pub async fn resolve_selection(
        &self,
        task_id: &str,
        action: SelectionAction,
    ) -> Result<Resolution, EngineError> {
        match &action {
            SelectionAction::Select { username, .. } | SelectionAction::Skip { username }
                if username.trim().is_empty() =>
            {
                return Err(EngineError::InvalidInput("username is empty".to_string()));
            }
            SelectionAction::RetrySearch { query: Some(query) } if query.trim().is_empty() => {
                return Err(EngineError::InvalidInput("retry query is empty".to_string()));
            }
            _ => {}
        }

        let label = action.label();
        let mut claim = self.selections.claim(task_id).await?;

        let resolution = match action {
            SelectionAction::Select {
                username,
                directory,
            } => {
                let pending = claim.pending();
                let candidate = pending.candidate(&username).ok_or_else(|| {
                    EngineError::InvalidInput(format!(
                        "{} is not a candidate for task {}",
                        username, task_id
                    ))
                })?;

                let mut options = pending
                    .search_config
                    .selection_options(pending.context.kind, pending.context.title.as_deref());
                options.directory = directory;

                let selection = select_files(&candidate.response.files, &options)
                    .map_err(|e| EngineError::InvalidInput(e.to_string()))?;
                let uploader = candidate.response.username.clone();

                let download = self.enqueue(task_id, &uploader, selection).await?;
                claim.consume();
                Resolution::Enqueued(download)
            }
            SelectionAction::Skip { username } => {
                if !claim.pending_mut().remove_candidate(&username) {
                    return Err(EngineError::InvalidInput(format!(
                        "{} is not a candidate for task {}",
                        username, task_id
                    )));
                }
                let remaining = claim.pending().candidates.len();
                info!(
                    "Task {} skipped {} ({} candidates left)",
                    task_id, username, remaining
                );
                if remaining > 0 {
                    drop(claim);
                    self.events.publish(EngineEvent::CandidateSkipped {
                        task_id: task_id.to_string(),
                        username,
                        remaining,
                    });
                    return Ok(Resolution::Skipped { remaining });
                }
                claim.consume();
                Resolution::Skipped { remaining }
            }
            SelectionAction::RetrySearch { query } => {
                let pending = claim.consume();
                self.resolved(task_id, label);

                let built = BuiltQuery {
                    primary: query
                        .map(|q| q.trim().to_string())
                        .unwrap_or_else(|| pending.query.clone()),
                    fallbacks: Vec::new(),
                };
                info!("Task {} searching again with '{}'", task_id, built.primary);

                let cancel = self.shutdown.child_token();
                let outcome = self
                    .run_search(
                        task_id,
                        &pending.context,
                        &built,
                        &pending.search_config,
                        &cancel,
                    )
                    .await?;
                return Ok(Resolution::Searched(outcome));
            }
            SelectionAction::AutoSelect => {
                let pending = claim.pending();
                let options = pending
                    .search_config
                    .selection_options(pending.context.kind, pending.context.title.as_deref());

                let (uploader, selection) = pending
                    .candidates
                    .iter()
                    .find_map(|c| {
                        select_files(&c.response.files, &options)
                            .ok()
                            .map(|s| (c.response.username.clone(), s))
                    })
                    .ok_or_else(|| EngineError::NoCandidates(task_id.to_string()))?;

                let download = self.enqueue(task_id, &uploader, selection).await?;
                claim.consume();
                Resolution::Enqueued(download)
            }
        };

        self.resolved(task_id, label);
        Ok(resolution)
    }

    /// Reputation record of `username`, created if missing.
    pub fn get_uploader_reputation(&self, username: &str) -> Result<ReputationRecord, EngineError> {
        if username.trim().is_empty() {
            return Err(EngineError::InvalidInput("username is empty".to_string()));
        }
        Ok(self.reputation.find_or_create(username)?)
    }

    /// Feed a download outcome into the reputation tracker.
    pub fn record_outcome(&self, username: &str, outcome: Outcome) -> Result<(), EngineError> {
        match outcome {
            Outcome::Success(success) => self.reputation.record_success(username, success)?,
            Outcome::Failure => self.reputation.record_failure(username)?,
        }
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    async fn run_search(
        &self,
        task_id: &str,
        context: &SearchContext,
        built: &BuiltQuery,
        config: &SearchConfig,
        cancel: &CancellationToken,
    ) -> Result<AcquisitionOutcome, EngineError> {
        let max_attempts = config.max_attempts();
        let mut last_reason = FailureReason::NoCandidates;

        for attempt in 1..=max_attempts {
            let query = query_for_attempt(built, attempt, config.retry.simplify_on_retry);
            self.events.publish(EngineEvent::SearchStarted {
                task_id: task_id.to_string(),
                query: query.clone(),
                attempt,
            });

            let result = self
                .orchestrator
                .attempt(task_id, context, &query, config, attempt, cancel)
                .await?;

            self.events.publish(EngineEvent::SearchFinished {
                task_id: task_id.to_string(),
                attempt,
                result: result.label().to_string(),
                candidates: match &result {
                    SearchAttemptResult::Success(success) => success.ranked.len(),
                    _ => 0,
                },
            });

            let retry_left = config.retry.enabled && attempt < max_attempts;
            match result {
                SearchAttemptResult::Success(success) => {
                    return self
                        .dispose(task_id, context, config, success, attempt)
                        .await;
                }
                SearchAttemptResult::Failed {
                    reason: reason @ FailureReason::SubmitFailed(_),
                } if retry_left => {
                    last_reason = reason;
                }
                SearchAttemptResult::Failed { reason } => {
                    info!("Task {} search failed: {}", task_id, reason);
                    return Ok(AcquisitionOutcome::Failed {
                        reason,
                        attempts: attempt,
                    });
                }
                SearchAttemptResult::Deferred { reason } => {
                    last_reason = reason;
                }
            }

            if attempt < max_attempts {
                info!(
                    "Task {} retrying in {}ms ({})",
                    task_id, config.retry.delay_ms, last_reason
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                    _ = sleep(config.retry_delay()) => {}
                }
            }
        }

        Ok(AcquisitionOutcome::Failed {
            reason: last_reason,
            attempts: max_attempts,
        })
    }

    async fn dispose(
        &self,
        task_id: &str,
        context: &SearchContext,
        config: &SearchConfig,
        success: SearchSuccess,
        attempts: u32,
    ) -> Result<AcquisitionOutcome, EngineError> {
        match self.mode {
            SelectionMode::Auto => {
                let download = self
                    .enqueue(task_id, &success.response.username, success.selection)
                    .await?;
                Ok(AcquisitionOutcome::Enqueued { download, attempts })
            }
            SelectionMode::Interactive => {
                let pending = self
                    .selections
                    .stage(PendingSelection::new(
                        task_id,
                        context.clone(),
                        success.query,
                        config.clone(),
                        success.ranked,
                    ))
                    .await;

                self.events.publish(EngineEvent::SelectionStaged {
                    task_id: task_id.to_string(),
                    candidates: pending.candidates.len(),
                    expires_at: pending.expires_at,
                });
                Ok(AcquisitionOutcome::AwaitingSelection { pending, attempts })
            }
        }
    }

    async fn enqueue(
        &self,
        task_id: &str,
        username: &str,
        selection: FileSelection,
    ) -> Result<EnqueuedDownload, EngineError> {
        let job = self
            .downloads
            .enqueue_download(username, &selection.directory, &selection.files)
            .await
            .map_err(|e| {
                warn!(task_id = %task_id, username = %username, error = %e, "Enqueue failed");
                EngineError::NetworkFailure(e)
            })?;

        metrics::DOWNLOADS_ENQUEUED.inc();
        self.monitor
            .track(task_id, job.clone(), &selection.files)
            .await;
        self.events.publish(EngineEvent::DownloadEnqueued {
            task_id: task_id.to_string(),
            job_id: job.id.clone(),
            username: username.to_string(),
            directory: selection.directory.clone(),
            files: selection.files.len(),
        });
        info!(
            "Task {} enqueued {} files from {} ('{}')",
            task_id,
            selection.files.len(),
            username,
            selection.directory
        );

        Ok(EnqueuedDownload {
            task_id: task_id.to_string(),
            job,
            selection,
        })
    }

    fn resolved(&self, task_id: &str, action: &str) {
        metrics::SELECTIONS_RESOLVED
            .with_label_values(&[action])
            .inc();
        self.events.publish(EngineEvent::SelectionResolved {
            task_id: task_id.to_string(),
            action: action.to_string(),
        });
    }
}
