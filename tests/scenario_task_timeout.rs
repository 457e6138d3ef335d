//! S4: an agent that never responds in time causes its task to time out
//! without blocking the rest of the session; since the timed-out task
//! never succeeds, the session ends `Failed` rather than hanging.

mod common;

use std::sync::Arc;
use std::time::Duration;

use amcp::adapters::demo_agents::ScriptedAgent;
use amcp::adapters::planner::KeywordRoute;
use amcp::domain::models::{SessionState, TaskOutcome};
use amcp::infrastructure::config::MeshConfig;
use amcp::mesh::MeshBuilder;

#[tokio::test]
async fn slow_agent_times_out_instead_of_hanging_the_session() {
    common::setup_test_logging();

    let mut config = MeshConfig::default();
    config.task_timeout_ms = 100;
    let mesh = MeshBuilder::new(config)
        .with_fallback_routes(vec![KeywordRoute::new("weather", "weather.get")])
        .build();

    let slow_agent = Arc::new(
        ScriptedAgent::new("slow-weather-agent", "weather.get", serde_json::json!({}))
            .with_delay(Duration::from_secs(5)),
    );
    slow_agent.install(mesh.context(), mesh.registry()).await.unwrap();

    let started = std::time::Instant::now();
    let session = mesh.run("what's the weather").await.unwrap();

    assert!(
        started.elapsed() < Duration::from_secs(2),
        "orchestrator should not wait past its configured timeout"
    );
    assert_eq!(session.state, SessionState::Failed);
    let (_, result) = session.completed_tasks.iter().next().expect("one task was dispatched");
    assert!(matches!(result.outcome, TaskOutcome::TimedOut));
}
