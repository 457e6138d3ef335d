//! S6: a subscriber registered with a hierarchical wildcard pattern
//! receives every event published under that hierarchy, not just exact
//! topic matches.

mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use amcp::domain::models::{AgentId, Event, FnHandler, Subscription};
use amcp::services::event_broker::EventBroker;

#[tokio::test]
async fn double_star_subscription_catches_the_whole_subtree() {
    common::setup_test_logging();

    let broker = EventBroker::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_for_handler = hits.clone();

    broker
        .subscribe(Subscription::new(
            AgentId::from("audit-agent"),
            "io.amcp.orchestration.**",
            Arc::new(FnHandler(move |_event: &Event| {
                let hits = hits_for_handler.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })),
        ))
        .unwrap();

    for topic in [
        "io.amcp.orchestration.plan.created",
        "io.amcp.orchestration.session.completed",
        "io.amcp.orchestration.task.wave1.dispatched",
    ] {
        let event = Event::builder(topic).build().unwrap();
        broker.publish(event).await;
    }

    // An event outside the subscribed subtree must not be counted.
    broker
        .publish(Event::builder("io.amcp.weather.request").build().unwrap())
        .await;

    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
