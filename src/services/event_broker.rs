//! Event broker: the pub/sub core of the
//! mesh. Subscriptions are kept in a concurrent map keyed by pattern so
//! publish only has to walk patterns, not every subscriber; dispatch runs
//! each matching handler independently so one failing handler can't block
//! or fail delivery to the others.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::domain::errors::MeshResult;
use crate::domain::models::{AgentId, Event, Subscription};
use crate::services::topic_matcher;

/// Runtime counters exposed via [`EventBroker::stats`].
#[derive(Debug, Default)]
pub struct BrokerStats {
    pub published: AtomicU64,
    pub delivered: AtomicU64,
    pub handler_failures: AtomicU64,
    pub retries_exhausted: AtomicU64,
}

/// Central publish/subscribe broker. Cheap to
/// clone: all state lives behind `Arc`/`DashMap`, so every agent and the
/// orchestrator can hold their own handle.
#[derive(Clone)]
pub struct EventBroker {
    // Keyed by pattern so publish only evaluates distinct patterns once;
    // each pattern can have multiple subscribers.
    subscriptions: Arc<DashMap<String, Vec<Subscription>>>,
    stats: Arc<BrokerStats>,
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroker {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(DashMap::new()),
            stats: Arc::new(BrokerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<BrokerStats> {
        self.stats.clone()
    }

    /// Register `handler` against `pattern` for `subscriber_id`. Validates
    /// the pattern and is idempotent on a repeat
    /// `(subscriber_id, pattern)` pair: the
    /// existing registration wins and the new handler is dropped.
    pub fn subscribe(&self, subscription: Subscription) -> MeshResult<()> {
        topic_matcher::validate_pattern(&subscription.pattern)?;
        let key = subscription.key();
        let mut entry = self.subscriptions.entry(subscription.pattern.clone()).or_default();
        if entry.iter().any(|s| s.key() == key) {
            debug!(subscriber = %key.0, pattern = %key.1, "duplicate subscription ignored");
            return Ok(());
        }
        entry.push(subscription);
        Ok(())
    }

    /// Remove every subscription for `subscriber_id` on `pattern`.
    pub fn unsubscribe(&self, subscriber_id: &AgentId, pattern: &str) {
        if let Some(mut entry) = self.subscriptions.get_mut(pattern) {
            entry.retain(|s| &s.subscriber_id != subscriber_id);
        }
    }

    /// Remove every subscription owned by `subscriber_id`, across all
    /// patterns. Used when an agent is destroyed.
    pub fn unsubscribe_all(&self, subscriber_id: &AgentId) {
        for mut entry in self.subscriptions.iter_mut() {
            entry.retain(|s| &s.subscriber_id != subscriber_id);
        }
    }

    /// Publish `event` to every subscription whose pattern matches its
    /// topic. Commits the event and returns as soon as matching
    /// subscriptions are resolved; each handler runs on its own spawned
    /// task, off the publisher's task, so a slow or reentrant handler
    /// can't block the publish call or its caller. At-most-once
    /// deliveries run each handler once and log failures; reliable
    /// deliveries retry with exponential backoff up to
    /// `event.delivery.max_retries` times before logging the handler as
    /// failed-exhausted.
    pub async fn publish(&self, event: Event) {
        self.stats.published.fetch_add(1, Ordering::Relaxed);

        let matching: Vec<Subscription> = self
            .subscriptions
            .iter()
            .filter(|entry| topic_matcher::matches(entry.key(), &event.topic))
            .flat_map(|entry| entry.value().clone())
            .collect();

        for subscription in matching {
            let broker = self.clone();
            let event = event.clone();
            tokio::spawn(async move {
                broker.dispatch_one(subscription, &event).await;
            });
        }
    }

    async fn dispatch_one(&self, subscription: Subscription, event: &Event) {
        if !event.delivery.reliable {
            match subscription.handler.handle(event).await {
                Ok(()) => self.stats.delivered.fetch_add(1, Ordering::Relaxed),
                Err(err) => {
                    self.stats.handler_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        subscriber = %subscription.subscriber_id,
                        topic = %event.topic,
                        error = %err,
                        "handler failed (at-most-once, no retry)"
                    );
                }
            };
            return;
        }

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(50))
            .with_max_elapsed_time(None)
            .build();

        let mut attempts = 0u32;
        loop {
            match subscription.handler.handle(event).await {
                Ok(()) => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(err) => {
                    attempts += 1;
                    if attempts > event.delivery.max_retries {
                        self.stats.handler_failures.fetch_add(1, Ordering::Relaxed);
                        self.stats.retries_exhausted.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            subscriber = %subscription.subscriber_id,
                            topic = %event.topic,
                            attempts,
                            error = %err,
                            "handler failed, retries exhausted"
                        );
                        return;
                    }
                    let wait = backoff.next_backoff().unwrap_or(Duration::from_millis(100));
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.iter().map(|e| e.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use super::*;
    use crate::domain::models::{DeliveryOptions, FnHandler};

    fn handler(counter: Arc<AtomicUsize>) -> Arc<dyn crate::domain::models::EventHandler> {
        Arc::new(FnHandler(move |_event: &Event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn publish_delivers_to_matching_subscribers_only() {
        let broker = EventBroker::new();
        let weather_hits = Arc::new(AtomicUsize::new(0));
        let stock_hits = Arc::new(AtomicUsize::new(0));

        broker
            .subscribe(Subscription::new(
                AgentId::from("weather-agent"),
                "io.amcp.weather.**",
                handler(weather_hits.clone()),
            ))
            .unwrap();
        broker
            .subscribe(Subscription::new(
                AgentId::from("stock-agent"),
                "io.amcp.stock.**",
                handler(stock_hits.clone()),
            ))
            .unwrap();

        let event = Event::builder("io.amcp.weather.request").build().unwrap();
        broker.publish(event).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(weather_hits.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(stock_hits.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_subscription_is_a_no_op() {
        let broker = EventBroker::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let agent = AgentId::from("weather-agent");

        broker
            .subscribe(Subscription::new(agent.clone(), "a.b", handler(hits.clone())))
            .unwrap();
        broker
            .subscribe(Subscription::new(agent.clone(), "a.b", handler(hits.clone())))
            .unwrap();

        assert_eq!(broker.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_all_removes_every_pattern_for_agent() {
        let broker = EventBroker::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let agent = AgentId::from("weather-agent");

        broker
            .subscribe(Subscription::new(agent.clone(), "a.b", handler(hits.clone())))
            .unwrap();
        broker
            .subscribe(Subscription::new(agent.clone(), "c.d", handler(hits.clone())))
            .unwrap();
        broker.unsubscribe_all(&agent);

        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn invalid_pattern_is_rejected_at_subscribe_time() {
        let broker = EventBroker::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let err = broker
            .subscribe(Subscription::new(
                AgentId::from("x"),
                "a.**.b",
                handler(hits),
            ))
            .unwrap_err();
        assert!(matches!(err, crate::domain::errors::MeshError::InvalidPattern(_)));
    }

    #[tokio::test]
    async fn reliable_delivery_retries_until_success() {
        let broker = EventBroker::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let handler: Arc<dyn crate::domain::models::EventHandler> =
            Arc::new(FnHandler(move |_event: &Event| {
                let attempts = attempts_clone.clone();
                async move {
                    let n = attempts.fetch_add(1, AtomicOrdering::SeqCst);
                    if n < 2 {
                        Err(crate::domain::errors::MeshError::HandlerFailure("not yet".into()))
                    } else {
                        Ok(())
                    }
                }
            }));

        broker
            .subscribe(Subscription::new(AgentId::from("x"), "a.b", handler))
            .unwrap();

        let event = Event::builder("a.b")
            .delivery(DeliveryOptions::reliable(5))
            .build()
            .unwrap();
        broker.publish(event).await;

        for _ in 0..50 {
            if attempts.load(AtomicOrdering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(attempts.load(AtomicOrdering::SeqCst), 3);
    }
}
