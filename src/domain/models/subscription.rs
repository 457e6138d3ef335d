//! Subscription domain model.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::MeshResult;
use crate::domain::models::event::Event;
use crate::domain::models::ids::AgentId;

/// Invoked by the broker for every event matching a subscription's
/// pattern. Handlers run off the publisher's thread and
/// may fail independently without affecting other handlers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> MeshResult<()>;
}

/// Adapts a plain async closure into an [`EventHandler`], so tests and
/// simple agents don't need to define a struct just to subscribe.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = MeshResult<()>> + Send,
{
    async fn handle(&self, event: &Event) -> MeshResult<()> {
        (self.0)(event).await
    }
}

/// A (subscriber id, pattern, handler) tuple. Keyed by
/// `(subscriber_id, pattern)` for idempotent subscribe.
#[derive(Clone)]
pub struct Subscription {
    pub subscriber_id: AgentId,
    pub pattern: String,
    pub handler: Arc<dyn EventHandler>,
}

impl Subscription {
    pub fn new(subscriber_id: AgentId, pattern: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            subscriber_id,
            pattern: pattern.into(),
            handler,
        }
    }

    /// Key used for idempotency and removal: duplicates on the same
    /// (subscriber, pattern) pair are no-ops per 
    pub fn key(&self) -> (AgentId, String) {
        (self.subscriber_id.clone(), self.pattern.clone())
    }
}
