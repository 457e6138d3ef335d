//! Correlation tracker: matches an async
//! response event back to the request that triggered it, and enforces a
//! per-request deadline so a caller never waits forever on an agent that
//! never answers.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::domain::errors::{MeshError, MeshResult};
use crate::domain::models::{CorrelationId, Event};

struct PendingRequest {
    sender: oneshot::Sender<Event>,
}

/// Tracks in-flight request/response correlations. Exactly one response
/// per correlation id is delivered to the waiter; a second response for
/// the same id is logged and discarded.
#[derive(Clone)]
pub struct CorrelationTracker {
    pending: Arc<DashMap<CorrelationId, PendingRequest>>,
}

impl Default for CorrelationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Register a new correlation and return a receiver that resolves
    /// when [`complete`](Self::complete) is called with a matching event,
    /// or errors on timeout/cancellation.
    pub fn begin(&self, correlation_id: CorrelationId) -> CorrelationWaiter {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(correlation_id, PendingRequest { sender: tx });
        CorrelationWaiter {
            correlation_id,
            receiver: rx,
            tracker: self.clone(),
        }
    }

    /// Await a response for `correlation_id`, racing the given deadline
    ///. On timeout the pending entry is removed so a late
    /// arrival is treated as a duplicate rather than resurrecting a dead
    /// wait.
    pub async fn await_response(&self, correlation_id: CorrelationId, deadline: Duration) -> MeshResult<Event> {
        let waiter = self.begin(correlation_id);
        match tokio::time::timeout(deadline, waiter.receiver).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_canceled)) => Err(MeshError::Cancelled(correlation_id.to_string())),
            Err(_elapsed) => {
                self.pending.remove(&correlation_id);
                Err(MeshError::Timeout(deadline))
            }
        }
    }

    /// Deliver `event` to whoever is waiting on `event.correlation_id`, if
    /// anyone still is. Returns `true` if a waiter received it.
    pub fn complete(&self, event: Event) -> bool {
        let Some(correlation_id) = event.correlation_id else {
            return false;
        };
        match self.pending.remove(&correlation_id) {
            Some((_, pending)) => pending.sender.send(event).is_ok(),
            None => {
                debug!(%correlation_id, "response for unknown or already-completed correlation");
                false
            }
        }
    }

    /// Cancel a pending correlation without completing it (session-wide
    /// cascade cancel, ).
    pub fn cancel(&self, correlation_id: CorrelationId) {
        if self.pending.remove(&correlation_id).is_some() {
            warn!(%correlation_id, "correlation cancelled before completion");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Handle returned by [`CorrelationTracker::begin`] for callers that want
/// to drive the await loop themselves instead of using
/// [`CorrelationTracker::await_response`].
pub struct CorrelationWaiter {
    pub correlation_id: CorrelationId,
    receiver: oneshot::Receiver<Event>,
    tracker: CorrelationTracker,
}

impl CorrelationWaiter {
    pub async fn wait(self, deadline: Duration) -> MeshResult<Event> {
        let correlation_id = self.correlation_id;
        let tracker = self.tracker.clone();
        match tokio::time::timeout(deadline, self.receiver).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_canceled)) => Err(MeshError::Cancelled(correlation_id.to_string())),
            Err(_elapsed) => {
                tracker.pending.remove(&correlation_id);
                Err(MeshError::Timeout(deadline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_a_matching_waiter() {
        let tracker = CorrelationTracker::new();
        let correlation_id = CorrelationId::new();

        let tracker_clone = tracker.clone();
        let waiter = tokio::spawn(async move {
            tracker_clone
                .await_response(correlation_id, Duration::from_secs(1))
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let response = Event::builder("io.amcp.task.response")
            .correlation_id(correlation_id)
            .build()
            .unwrap();
        assert!(tracker.complete(response));

        let result = waiter.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn times_out_when_no_response_arrives() {
        let tracker = CorrelationTracker::new();
        let correlation_id = CorrelationId::new();
        let result = tracker
            .await_response(correlation_id, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(MeshError::Timeout(_))));
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_response_is_discarded_silently() {
        let tracker = CorrelationTracker::new();
        let correlation_id = CorrelationId::new();

        let tracker_clone = tracker.clone();
        let waiter = tokio::spawn(async move {
            tracker_clone
                .await_response(correlation_id, Duration::from_secs(1))
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let first = Event::builder("io.amcp.task.response")
            .correlation_id(correlation_id)
            .build()
            .unwrap();
        let second = Event::builder("io.amcp.task.response")
            .correlation_id(correlation_id)
            .build()
            .unwrap();

        assert!(tracker.complete(first));
        assert!(!tracker.complete(second));
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn event_without_correlation_id_is_never_completed() {
        let tracker = CorrelationTracker::new();
        let event = Event::builder("io.amcp.plan.created").build().unwrap();
        assert!(!tracker.complete(event));
    }
}
