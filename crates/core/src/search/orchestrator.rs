//! Search orchestration against the external network.

use std::sync::Arc;

use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::EngineError;
use crate::metrics;
use crate::network::{CandidateResponse, SearchNetwork, SearchState};
use crate::query::SearchContext;
use crate::quality;
use crate::reputation::ReputationTracker;
use crate::selector::select_files;

use super::config::SearchConfig;
use super::ranking::rank_candidates;
use super::types::{FailureReason, SearchAttemptResult, SearchSuccess};

/// How polling ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollEnd {
    Completed,
    SoftTimeout,
    HardCeiling,
    PollError,
    Cancelled,
}

/// Runs single search attempts: submit, poll, filter, rank, select.
pub struct SearchOrchestrator {
    network: Arc<dyn SearchNetwork>,
    reputation: Arc<ReputationTracker>,
}

impl SearchOrchestrator {
    pub fn new(network: Arc<dyn SearchNetwork>, reputation: Arc<ReputationTracker>) -> Self {
        Self {
            network,
            reputation,
        }
    }

    /// Run one attempt with `query`.
    ///
    /// Network trouble ends as `Failed` or `Deferred`; the only error is
    /// [`EngineError::Cancelled`].
    pub async fn attempt(
        &self,
        task_id: &str,
        context: &SearchContext,
        query: &str,
        config: &SearchConfig,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchAttemptResult, EngineError> {
        let started = Instant::now();
        let result = self
            .run_attempt(task_id, context, query, config, attempt, cancel)
            .await;

        let label = match &result {
            Ok(r) => r.label(),
            Err(_) => "cancelled",
        };
        metrics::SEARCH_ATTEMPTS.with_label_values(&[label]).inc();
        metrics::SEARCH_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    async fn run_attempt(
        &self,
        task_id: &str,
        context: &SearchContext,
        query: &str,
        config: &SearchConfig,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchAttemptResult, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        info!(
            "Task {} searching {} for '{}' (attempt {}/{})",
            task_id,
            self.network.name(),
            query,
            attempt,
            config.max_attempts()
        );

        let search_id = match self.network.submit_search(query).await {
            Ok(id) => id,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Search submission failed");
                return Ok(SearchAttemptResult::Failed {
                    reason: FailureReason::SubmitFailed(e.to_string()),
                });
            }
        };

        let (state, end) = self.poll_until_done(&search_id, config, cancel).await;

        if end != PollEnd::Completed {
            if let Err(e) = self.network.cancel_search(&search_id).await {
                warn!(search_id = %search_id, error = %e, "Failed to release search");
            }
        }

        if end == PollEnd::Cancelled {
            info!("Task {} search cancelled", task_id);
            return Err(EngineError::Cancelled);
        }

        debug!(
            task_id = %task_id,
            search_id = %search_id,
            end = ?end,
            responses = state.responses.len(),
            "Polling finished"
        );

        let usable = filter_responses(state.responses, config);
        let usable = match self.reputation.filter_by_reputation(usable) {
            Ok(responses) => responses,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Reputation filter failed");
                return Ok(SearchAttemptResult::Failed {
                    reason: FailureReason::Reputation(e.to_string()),
                });
            }
        };

        metrics::CANDIDATES_FOUND.observe(usable.len() as f64);

        if usable.is_empty() {
            let retry_left = config.retry.enabled && attempt < config.max_attempts();
            info!(
                "Task {} found no usable candidates (attempt {}, retry: {})",
                task_id, attempt, retry_left
            );
            return Ok(if retry_left {
                SearchAttemptResult::Deferred {
                    reason: FailureReason::NoCandidates,
                }
            } else {
                SearchAttemptResult::Failed {
                    reason: FailureReason::NoCandidates,
                }
            });
        }

        let preferences = config.quality.clone().unwrap_or_default();
        let ranked = rank_candidates(usable, &preferences, &self.reputation);
        let options = config.selection_options(context.kind, context.title.as_deref());

        let mut chosen = None;
        for candidate in ranked.iter().take(config.max_responses_to_eval) {
            match select_files(&candidate.response.files, &options) {
                Ok(selection) => {
                    chosen = Some((candidate.response.clone(), selection));
                    break;
                }
                Err(reason) => {
                    debug!(
                        username = %candidate.username(),
                        reason = %reason,
                        "Candidate rejected by file selector"
                    );
                }
            }
        }

        let Some((response, selection)) = chosen else {
            info!(
                "Task {} had {} candidates but none produced a valid selection",
                task_id,
                ranked.len()
            );
            return Ok(SearchAttemptResult::Failed {
                reason: FailureReason::NoValidSelection,
            });
        };

        info!(
            "Task {} best candidate {} ({} files in '{}') out of {}",
            task_id,
            response.username,
            selection.files.len(),
            selection.directory,
            ranked.len()
        );

        Ok(SearchAttemptResult::Success(SearchSuccess {
            response,
            search_id,
            selection,
            ranked,
            query: query.to_string(),
        }))
    }

    /// Poll until completion, a deadline, a poll error or cancellation.
    ///
    /// Returns the last snapshot received. No request is started at or past
    /// the hard ceiling, and an in-flight poll is cut off when it is reached.
    async fn poll_until_done(
        &self,
        search_id: &str,
        config: &SearchConfig,
        cancel: &CancellationToken,
    ) -> (SearchState, PollEnd) {
        let started = Instant::now();
        let hard_deadline = started + config.max_wait();
        let soft_deadline = (started + config.search_timeout()).min(hard_deadline);
        let mut latest = SearchState::default();

        loop {
            let wait = config
                .poll_interval()
                .min(soft_deadline.saturating_duration_since(Instant::now()));

            tokio::select! {
                _ = cancel.cancelled() => return (latest, PollEnd::Cancelled),
                _ = sleep(wait) => {}
            }

            let now = Instant::now();
            if now >= hard_deadline {
                return (latest, PollEnd::HardCeiling);
            }

            metrics::SEARCH_POLLS.inc();
            match timeout(hard_deadline - now, self.network.poll_state(search_id)).await {
                Ok(Ok(state)) => {
                    debug!(
                        search_id = %search_id,
                        responses = state.responses.len(),
                        complete = state.complete,
                        "Polled search"
                    );
                    let complete = state.complete;
                    latest = state;
                    if complete {
                        return (latest, PollEnd::Completed);
                    }
                }
                Ok(Err(e)) => {
                    warn!(search_id = %search_id, error = %e, "Poll failed; keeping last snapshot");
                    return (latest, PollEnd::PollError);
                }
                Err(_) => return (latest, PollEnd::HardCeiling),
            }

            if Instant::now() >= soft_deadline {
                return (latest, PollEnd::SoftTimeout);
            }
        }
    }
}

/// Keep responses within the file-count bounds that contain audio.
fn filter_responses(
    responses: Vec<CandidateResponse>,
    config: &SearchConfig,
) -> Vec<CandidateResponse> {
    responses
        .into_iter()
        .filter(|r| {
            let count = r.files.len();
            count >= config.min_response_files
                && count <= config.max_response_files
                && r
                    .files
                    .iter()
                    .any(|f| quality::detect_format(&f.filename).is_audio())
        })
        .collect()
}
