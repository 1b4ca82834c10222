//! Mock search network for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::network::{CandidateResponse, NetworkError, SearchNetwork, SearchState};

/// A recorded search submission.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    pub search_id: String,
    pub query: String,
    pub submitted_at: Instant,
}

/// When a mock search reports completion.
#[derive(Debug, Clone, Copy)]
enum Completion {
    /// Complete on the n-th poll of a search.
    AfterPolls(u32),
    Never,
}

/// Produces responses for a query; `None` falls back to the configured set.
type QueryHandler = Box<dyn Fn(&str) -> Option<Vec<CandidateResponse>> + Send + Sync>;

#[derive(Debug, Default)]
struct MockSearch {
    responses: Vec<CandidateResponse>,
    polls: u32,
}

/// Mock implementation of the SearchNetwork trait.
///
/// - Returns configurable responses, optionally per query
/// - Completes after a given number of polls, or never
/// - Records queries, poll times and cancellations
/// - Simulates submit and poll failures and slow polls
///
/// # Example
///
/// ```rust,ignore
/// let network = MockSearchNetwork::new();
/// network.set_responses(vec![fixtures::album_response("u", "A", &["1.flac"], None)]).await;
/// network.complete_after(2).await;
///
/// let id = network.submit_search("artist album").await?;
/// assert!(!network.poll_state(&id).await?.complete);
/// assert!(network.poll_state(&id).await?.complete);
/// ```
pub struct MockSearchNetwork {
    responses: Arc<RwLock<Vec<CandidateResponse>>>,
    query_handler: Arc<RwLock<Option<QueryHandler>>>,
    completion: Arc<RwLock<Completion>>,
    searches: Arc<RwLock<HashMap<String, MockSearch>>>,
    submitted: Arc<RwLock<Vec<RecordedSearch>>>,
    /// Offset of each poll from its search's submission.
    poll_offsets: Arc<RwLock<Vec<Duration>>>,
    cancelled: Arc<RwLock<Vec<String>>>,
    next_submit_error: Arc<RwLock<Option<NetworkError>>>,
    next_poll_error: Arc<RwLock<Option<NetworkError>>>,
    poll_delay: Arc<RwLock<Option<Duration>>>,
}

impl std::fmt::Debug for MockSearchNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSearchNetwork")
            .field("responses", &"<responses>")
            .field("query_handler", &"<handler>")
            .field("completion", &"<completion>")
            .field("searches", &"<searches>")
            .finish()
    }
}

impl Default for MockSearchNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearchNetwork {
    /// Create a mock whose searches complete on the first poll with no responses.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(Vec::new())),
            query_handler: Arc::new(RwLock::new(None)),
            completion: Arc::new(RwLock::new(Completion::AfterPolls(1))),
            searches: Arc::new(RwLock::new(HashMap::new())),
            submitted: Arc::new(RwLock::new(Vec::new())),
            poll_offsets: Arc::new(RwLock::new(Vec::new())),
            cancelled: Arc::new(RwLock::new(Vec::new())),
            next_submit_error: Arc::new(RwLock::new(None)),
            next_poll_error: Arc::new(RwLock::new(None)),
            poll_delay: Arc::new(RwLock::new(None)),
        }
    }

    /// Responses returned by searches submitted from now on.
    pub async fn set_responses(&self, responses: Vec<CandidateResponse>) {
        *self.responses.write().await = responses;
    }

    /// Choose responses by query string.
    pub async fn set_query_handler<F>(&self, handler: F)
    where
        F: Fn(&str) -> Option<Vec<CandidateResponse>> + Send + Sync + 'static,
    {
        *self.query_handler.write().await = Some(Box::new(handler));
    }

    /// Report completion on the n-th poll of each search.
    pub async fn complete_after(&self, polls: u32) {
        *self.completion.write().await = Completion::AfterPolls(polls.max(1));
    }

    /// Never report completion.
    pub async fn never_complete(&self) {
        *self.completion.write().await = Completion::Never;
    }

    /// Make every poll take this long.
    pub async fn set_poll_delay(&self, delay: Duration) {
        *self.poll_delay.write().await = Some(delay);
    }

    pub async fn set_next_submit_error(&self, error: NetworkError) {
        *self.next_submit_error.write().await = Some(error);
    }

    pub async fn set_next_poll_error(&self, error: NetworkError) {
        *self.next_poll_error.write().await = Some(error);
    }

    /// Submitted searches in order.
    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.submitted.read().await.clone()
    }

    /// Submitted query strings in order.
    pub async fn recorded_queries(&self) -> Vec<String> {
        self.submitted
            .read()
            .await
            .iter()
            .map(|s| s.query.clone())
            .collect()
    }

    /// Total polls across all searches.
    pub async fn poll_count(&self) -> usize {
        self.poll_offsets.read().await.len()
    }

    /// When each poll started, relative to its search's submission.
    pub async fn poll_offsets(&self) -> Vec<Duration> {
        self.poll_offsets.read().await.clone()
    }

    /// Search ids that were cancelled.
    pub async fn cancelled_searches(&self) -> Vec<String> {
        self.cancelled.read().await.clone()
    }
}

#[async_trait]
impl SearchNetwork for MockSearchNetwork {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit_search(&self, query: &str) -> Result<String, NetworkError> {
        if let Some(error) = self.next_submit_error.write().await.take() {
            return Err(error);
        }

        let handled = match self.query_handler.read().await.as_ref() {
            Some(handler) => handler(query),
            None => None,
        };
        let responses = match handled {
            Some(responses) => responses,
            None => self.responses.read().await.clone(),
        };

        let mut submitted = self.submitted.write().await;
        let search_id = format!("search-{}", submitted.len() + 1);
        submitted.push(RecordedSearch {
            search_id: search_id.clone(),
            query: query.to_string(),
            submitted_at: Instant::now(),
        });

        self.searches.write().await.insert(
            search_id.clone(),
            MockSearch {
                responses,
                polls: 0,
            },
        );

        Ok(search_id)
    }

    async fn poll_state(&self, search_id: &str) -> Result<SearchState, NetworkError> {
        let submitted_at = self
            .submitted
            .read()
            .await
            .iter()
            .find(|s| s.search_id == search_id)
            .map(|s| s.submitted_at)
            .ok_or_else(|| NetworkError::SearchNotFound(search_id.to_string()))?;
        self.poll_offsets
            .write()
            .await
            .push(Instant::now().duration_since(submitted_at));

        let delay = *self.poll_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_poll_error.write().await.take() {
            return Err(error);
        }

        let completion = *self.completion.read().await;
        let mut searches = self.searches.write().await;
        let search = searches
            .get_mut(search_id)
            .ok_or_else(|| NetworkError::SearchNotFound(search_id.to_string()))?;
        search.polls += 1;

        let complete = match completion {
            Completion::AfterPolls(n) => search.polls >= n,
            Completion::Never => false,
        };

        Ok(SearchState {
            complete,
            responses: search.responses.clone(),
        })
    }

    async fn cancel_search(&self, search_id: &str) -> Result<(), NetworkError> {
        self.cancelled.write().await.push(search_id.to_string());
        Ok(())
    }
}
