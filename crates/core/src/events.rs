//! Engine event bus.
//!
//! Observers subscribe to lifecycle events (searches, staged selections,
//! downloads). Publishing never blocks: the bus is a bounded
//! `tokio::broadcast` channel and slow subscribers lose the oldest events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, Receiver, Sender};

/// Sequential event identifier.
pub type EventId = u64;

const DEFAULT_CAPACITY: usize = 256;

/// Events emitted by the acquisition engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    SearchStarted {
        task_id: String,
        query: String,
        attempt: u32,
    },
    SearchFinished {
        task_id: String,
        attempt: u32,
        /// `success`, `failed` or `deferred`.
        result: String,
        candidates: usize,
    },
    SelectionStaged {
        task_id: String,
        candidates: usize,
        expires_at: Option<DateTime<Utc>>,
    },
    SelectionResolved {
        task_id: String,
        action: String,
    },
    /// A candidate was dropped and the selection is still pending.
    CandidateSkipped {
        task_id: String,
        username: String,
        remaining: usize,
    },
    DownloadEnqueued {
        task_id: String,
        job_id: String,
        username: String,
        directory: String,
        files: usize,
    },
    /// All files of a job arrived; downstream organization can start.
    DownloadCompleted {
        job_id: String,
        username: String,
        directory: String,
        bytes: u64,
    },
    DownloadFailed {
        job_id: String,
        username: String,
        reason: String,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::SearchStarted { .. } => "search_started",
            EngineEvent::SearchFinished { .. } => "search_finished",
            EngineEvent::SelectionStaged { .. } => "selection_staged",
            EngineEvent::SelectionResolved { .. } => "selection_resolved",
            EngineEvent::CandidateSkipped { .. } => "candidate_skipped",
            EngineEvent::DownloadEnqueued { .. } => "download_enqueued",
            EngineEvent::DownloadCompleted { .. } => "download_completed",
            EngineEvent::DownloadFailed { .. } => "download_failed",
        }
    }
}

/// An event with its id and emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub event: EngineEvent,
}

/// Shared event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Bus keeping up to `capacity` undelivered events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Publish an event. Succeeds with no subscribers.
    pub fn publish(&self, event: EngineEvent) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        });
        id
    }

    pub fn subscribe(&self) -> Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn resolved(task_id: &str) -> EngineEvent {
        EngineEvent::SelectionResolved {
            task_id: task_id.to_string(),
            action: "skip".to_string(),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(resolved("t1")), 1);
        assert_eq!(bus.publish(resolved("t2")), 2);
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(resolved("t1"));
        bus.publish(resolved("t2"));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.event, resolved("t1"));
        assert_eq!(second.event, resolved("t2"));
        assert!(second.id > first.id);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.publish(resolved(&format!("t{}", i)));
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap().event, resolved("t3"));
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(resolved("t1")).unwrap();
        assert_eq!(json["type"], "selection_resolved");
        assert_eq!(resolved("t1").kind(), "selection_resolved");
    }
}
