//! Orchestrator: the central coordinator
//! that turns a goal into a plan, dispatches it level by level over the
//! mesh, collects results through the correlation tracker, and hands the
//! results to the synthesizer. A thin coordinator over the other
//! services, not a place for new state machines — the actual state lives
//! in [`OrchestrationSession`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::domain::errors::{MeshError, MeshErrorEvent, MeshResult};
use crate::domain::models::{
    CorrelationId, DeliveryOptions, Event, OrchestrationSession, SessionId, SessionState, TaskDefinition,
    TaskId, TaskPlan, TaskResult,
};
use crate::services::agent_context::AgentContext;
use crate::services::agent_registry::AgentRegistry;
use crate::services::correlation_tracker::CorrelationTracker;
use crate::services::metrics::{MetricsRegistry, MetricsSnapshot, Phase};
use crate::services::synthesizer::Synthesizer;
use crate::services::task_planning_engine::TaskPlanningEngine;

/// Topic an agent advertising `agent_type` is expected to subscribe to
/// for task dispatch, e.g. `io.amcp.task.weather.get.request`.
pub fn task_request_topic(agent_type: &str) -> String {
    format!("io.amcp.task.{agent_type}.request")
}

/// Topic a task's response is published on once a handling agent replies,
/// matching the correlation id the request carried.
pub const TASK_RESPONSE_TOPIC: &str = "io.amcp.task.response";

/// Topic a goal can be submitted on instead of calling [`Orchestrator::run`]
/// directly; [`crate::mesh::MeshBuilder`] wires a router that picks up
/// `{"query": "..."}` payloads published here and runs them in the
/// background.
pub const ORCHESTRATION_REQUEST_TOPIC: &str = "io.amcp.orchestration.request";
pub const ERROR_TOPIC: &str = "io.amcp.error";
pub const PLAN_CREATED_TOPIC: &str = "io.amcp.orchestration.plan.created";
pub const TASK_TIMEOUT_TOPIC: &str = "io.amcp.orchestration.task.timeout";
pub const SESSION_COMPLETED_TOPIC: &str = "io.amcp.orchestration.complete";

/// CloudEvents `ce-source` stamped on every event the orchestrator
/// publishes.
const CE_SOURCE: &str = "urn:amcp:orchestrator:1";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per-task deadline while collecting a dispatched level.
    pub task_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(30),
        }
    }
}

/// Coordinates a goal from submission through synthesis.
#[derive(Clone)]
pub struct Orchestrator {
    context: AgentContext,
    registry: AgentRegistry,
    tracker: CorrelationTracker,
    planning_engine: Arc<TaskPlanningEngine>,
    synthesizer: Arc<Synthesizer>,
    metrics: MetricsRegistry,
    config: OrchestratorConfig,
    sessions: Arc<DashMap<SessionId, OrchestrationSession>>,
    plans: Arc<DashMap<SessionId, TaskPlan>>,
}

impl Orchestrator {
    pub fn new(
        context: AgentContext,
        registry: AgentRegistry,
        tracker: CorrelationTracker,
        planning_engine: Arc<TaskPlanningEngine>,
        synthesizer: Arc<Synthesizer>,
        metrics: MetricsRegistry,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            context,
            registry,
            tracker,
            planning_engine,
            synthesizer,
            metrics,
            config,
            sessions: Arc::new(DashMap::new()),
            plans: Arc::new(DashMap::new()),
        }
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn session(&self, session_id: SessionId) -> Option<OrchestrationSession> {
        self.sessions.get(&session_id).map(|s| s.clone())
    }

    /// Snapshot of every session seen since this orchestrator was built,
    /// regardless of state. Used to find the session a goal submitted via
    /// [`ORCHESTRATION_REQUEST_TOPIC`] spawned, since that path has no
    /// direct return value to hand the caller.
    pub fn sessions(&self) -> Vec<OrchestrationSession> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    /// Run a goal end to end: plan, dispatch wave by wave,
    /// synthesize, and return the final session. Errors are recorded onto
    /// the session as `Failed` rather than propagated, except for planning
    /// failures which can never happen once the fallback planner is total
    /// — those are the one case this still returns `Err`
    /// for, since there is nothing meaningful left to synthesize.
    pub async fn run(&self, goal: impl Into<String>) -> MeshResult<OrchestrationSession> {
        let goal = goal.into();
        let mut session = OrchestrationSession::new(goal.clone());
        let session_id = session.session_id;
        self.metrics.session_started();
        let started = Instant::now();

        session.transition(SessionState::Planning).map_err(|_| {
            MeshError::PlanningError("session failed to enter planning state".into())
        })?;
        self.sessions.insert(session_id, session.clone());

        let plan_started = Instant::now();
        let known_agents = self.registry.discover_agents();
        let plan = match self.planning_engine.plan(goal.clone(), known_agents).await {
            Ok(plan) => plan,
            Err(err) => {
                self.fail_session(&mut session, err.to_string()).await;
                return Err(err);
            }
        };
        self.metrics.observe_phase(Phase::Plan, plan_started.elapsed()).await;
        session.plan_id = Some(plan.plan_id);
        self.plans.insert(session_id, plan.clone());

        self.context
            .publish(
                Event::builder(PLAN_CREATED_TOPIC)
                    .cloud_events(PLAN_CREATED_TOPIC, CE_SOURCE)
                    .payload(serde_json::json!({
                        "session_id": session_id.to_string(),
                        "plan_id": plan.plan_id.to_string(),
                        "task_count": plan.len(),
                    }))
                    .build()?,
            )
            .await;

        if let Err(transition_err) = session.transition(SessionState::Dispatching) {
            warn!(?transition_err, "unexpected session state before dispatch");
        }
        self.sessions.insert(session_id, session.clone());

        let optional_tasks: std::collections::HashSet<TaskId> = plan
            .tasks
            .values()
            .filter(|task| task.optional)
            .map(|task| task.task_id)
            .collect();

        let dispatch_started = Instant::now();
        for (level_index, level) in plan.execution_levels().iter().enumerate() {
            if level_index > 0 && session.transition(SessionState::Dispatching).is_ok() {
                self.sessions.insert(session_id, session.clone());
            }
            let level_tasks: Vec<TaskDefinition> = level
                .iter()
                .filter_map(|id| plan.tasks.get(id).cloned())
                .collect();
            let results = self.dispatch_level(session_id, &level_tasks).await;
            let level_required_failed = results
                .iter()
                .any(|r| !r.is_success() && !optional_tasks.contains(&r.task_id));
            for result in results {
                session.record_task_result(result);
            }
            self.sessions.insert(session_id, session.clone());

            // Every level leaves Dispatching for Collecting, whether or not
            // the plan is complete; a subsequent level re-enters Dispatching
            // above, and an incomplete plan simply never does.
            if session.transition(SessionState::Collecting).is_ok() {
                self.sessions.insert(session_id, session.clone());
            }

            if level_required_failed {
                // A required task's dependents can never become
                // executable; don't dispatch levels whose preconditions
                // were never met.
                break;
            }
        }
        self.metrics.observe_phase(Phase::Dispatch, dispatch_started.elapsed()).await;

        let collect_started = Instant::now();
        session.transition(SessionState::Synthesizing).ok();
        self.sessions.insert(session_id, session.clone());

        let results: Vec<TaskResult> = session.completed_tasks.values().cloned().collect();
        self.metrics.observe_phase(Phase::Collect, collect_started.elapsed()).await;

        let synth_started = Instant::now();
        let (synthesis, used_fallback) = self.synthesizer.synthesize(&goal, &results).await;
        self.metrics.observe_phase(Phase::Synth, synth_started.elapsed()).await;
        if used_fallback {
            self.metrics.synthesis_fallback();
        }
        session.synthesis = Some(synthesis);

        // A required (non-optional) task that didn't succeed fails the
        // whole session; a failed optional task is tolerated.
        let required_failed = results
            .iter()
            .any(|r| !r.is_success() && !optional_tasks.contains(&r.task_id));
        if !required_failed {
            session.transition(SessionState::Completed).ok();
            self.metrics.session_completed(started.elapsed()).await;
        } else {
            session.failure_reason = Some("one or more required tasks did not succeed".into());
            session.transition(SessionState::Failed).ok();
            self.metrics.session_failed();
        }
        self.sessions.insert(session_id, session.clone());

        self.context
            .publish(
                Event::builder(SESSION_COMPLETED_TOPIC)
                    .cloud_events(SESSION_COMPLETED_TOPIC, CE_SOURCE)
                    .payload(serde_json::json!({
                        "session_id": session_id.to_string(),
                        "state": session.state.as_str(),
                    }))
                    .build()?,
            )
            .await;

        Ok(session)
    }

    /// Point-in-time snapshot of accumulated counters and phase latencies.
    pub async fn stats(&self) -> MetricsSnapshot {
        self.metrics.snapshot().await
    }

    /// Cancel an in-flight session: every still-pending correlation for
    /// its dispatched tasks is cancelled and the session moves to
    /// `Cancelled`.
    pub fn cancel(&self, session_id: SessionId) {
        if let Some(mut session) = self.sessions.get_mut(&session_id) {
            if session.transition(SessionState::Cancelled).is_ok() {
                self.metrics.session_cancelled();
            }
        }
    }

    async fn dispatch_level(&self, session_id: SessionId, tasks: &[TaskDefinition]) -> Vec<TaskResult> {
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            handles.push(self.dispatch_one(session_id, task.clone()));
        }
        futures::future::join_all(handles).await
    }

    async fn dispatch_one(&self, session_id: SessionId, task: TaskDefinition) -> TaskResult {
        self.metrics.task_dispatched();

        let candidates = self.registry.discover_by_capability(&task.agent_type);
        if candidates.is_empty() {
            self.metrics.task_failed();
            let err = MeshError::UnroutableTask(task.agent_type.clone());
            self.publish_error(&err, None, Some(session_id)).await;
            return TaskResult::failure(task.task_id, err.to_string());
        }

        let correlation_id = CorrelationId::new();
        let request_topic = task_request_topic(&task.agent_type);
        let request = match Event::builder(&request_topic)
            .cloud_events(&request_topic, CE_SOURCE)
            .payload(serde_json::json!({
                "task_id": task.task_id.to_string(),
                "parameters": task.parameters,
            }))
            .correlation_id(correlation_id)
            .delivery(DeliveryOptions::at_most_once())
            .build()
        {
            Ok(event) => event,
            Err(err) => {
                self.metrics.task_failed();
                return TaskResult::failure(task.task_id, err.to_string());
            }
        };

        let waiter = self.tracker.begin(correlation_id);
        self.context.publish(request).await;

        let timeout = task
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.task_timeout);

        match waiter.wait(timeout).await {
            Ok(response) => {
                self.metrics.task_succeeded();
                TaskResult::success(task.task_id, response.payload)
            }
            Err(MeshError::Timeout(_)) => {
                self.metrics.task_timed_out();
                warn!(task_id = %task.task_id, agent_type = %task.agent_type, "task timed out");
                self.publish_timeout(&task, session_id).await;
                TaskResult::timed_out(task.task_id)
            }
            Err(err) => {
                self.metrics.task_failed();
                self.publish_error(&err, Some(correlation_id), Some(session_id)).await;
                TaskResult::failure(task.task_id, err.to_string())
            }
        }
    }

    async fn publish_timeout(&self, task: &TaskDefinition, session_id: SessionId) {
        if let Ok(event) = Event::builder(TASK_TIMEOUT_TOPIC)
            .cloud_events(TASK_TIMEOUT_TOPIC, CE_SOURCE)
            .payload(serde_json::json!({
                "session_id": session_id.to_string(),
                "task_id": task.task_id.to_string(),
                "agent_type": task.agent_type,
            }))
            .build()
        {
            self.context.publish(event).await;
        }
    }

    /// Deliver a response for `correlation_id` into the tracker. Called
    /// by the mesh's internal response-routing handler, not by agents
    /// directly — agents publish to [`TASK_RESPONSE_TOPIC`] and this is
    /// wired up as that topic's subscriber (see [`Orchestrator::install`]).
    pub fn complete_task(&self, event: Event) -> bool {
        self.tracker.complete(event)
    }

    async fn fail_session(&self, session: &mut OrchestrationSession, reason: String) {
        session.failure_reason = Some(reason.clone());
        session.transition(SessionState::Failed).ok();
        self.sessions.insert(session.session_id, session.clone());
        self.metrics.session_failed();
        error!(session_id = %session.session_id, reason = %reason, "session failed");
    }

    async fn publish_error(&self, err: &MeshError, correlation_id: Option<CorrelationId>, session_id: Option<SessionId>) {
        let event = MeshErrorEvent::from_mesh_error(err, correlation_id, session_id);
        if let Ok(built) = Event::builder(ERROR_TOPIC)
            .cloud_events(ERROR_TOPIC, CE_SOURCE)
            .payload(serde_json::to_value(&event).unwrap_or(Value::Null))
            .build()
        {
            self.context.publish(built).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::domain::errors::MeshResult as Result;
    use crate::domain::models::{AgentId, AgentInfo, EventHandler, FnHandler};
    use crate::domain::ports::{Agent, PlanRequest, PlanResponse, PlannedTask, PlannerTool};
    use crate::services::event_broker::EventBroker;
    use crate::services::synthesizer::Synthesizer;

    struct EchoAgent {
        id: AgentId,
        agent_type: String,
    }

    #[async_trait]
    impl Agent for EchoAgent {
        fn agent_id(&self) -> AgentId {
            self.id.clone()
        }

        fn capabilities(&self) -> Vec<String> {
            vec![self.agent_type.clone()]
        }

        async fn handle_event(&self, _event: &Event) -> Result<()> {
            Ok(())
        }
    }

    struct SingleTaskPlanner(String);

    #[async_trait]
    impl PlannerTool for SingleTaskPlanner {
        fn name(&self) -> &'static str {
            "single-task"
        }

        async fn decompose(&self, _request: PlanRequest) -> Result<PlanResponse> {
            Ok(PlanResponse {
                tasks: vec![PlannedTask::new(self.0.clone(), Value::Null)],
            })
        }
    }

    async fn setup_echo_agent(context: &AgentContext, registry: &AgentRegistry, agent_type: &str) {
        let agent = EchoAgent {
            id: AgentId::from(format!("{agent_type}-agent")),
            agent_type: agent_type.to_string(),
        };
        context.register(&agent).unwrap();
        registry.announce(AgentInfo::new(agent.agent_id(), "echo", agent.capabilities()));
        context.activate(&agent).await.unwrap();

        let context_for_handler = context.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnHandler(move |event: &Event| {
            let context = context_for_handler.clone();
            let event = event.clone();
            async move {
                let response = Event::builder(TASK_RESPONSE_TOPIC)
                    .correlation_id(event.correlation_id.unwrap())
                    .payload(serde_json::json!({"echoed": true}))
                    .build()?;
                context.publish(response).await;
                Ok(())
            }
        }));
        context
            .subscribe(&agent.id, task_request_topic(agent_type), handler)
            .unwrap();
    }

    fn build_orchestrator(context: AgentContext, registry: AgentRegistry, agent_type: &str) -> Orchestrator {
        let tracker = CorrelationTracker::new();
        let tracker_for_routing = tracker.clone();
        context.broker().subscribe(crate::domain::models::Subscription::new(
            AgentId::from("__orchestrator_response_router"),
            TASK_RESPONSE_TOPIC,
            Arc::new(FnHandler(move |event: &Event| {
                let tracker = tracker_for_routing.clone();
                let event = event.clone();
                async move {
                    tracker.complete(event);
                    Ok(())
                }
            })),
        )).unwrap();

        let planner = Arc::new(TaskPlanningEngine::new(
            Arc::new(SingleTaskPlanner(agent_type.to_string())),
            Arc::new(SingleTaskPlanner(agent_type.to_string())),
        ));
        let synthesizer = Arc::new(Synthesizer::new(None));
        Orchestrator::new(
            context,
            registry,
            tracker,
            planner,
            synthesizer,
            MetricsRegistry::new(),
            OrchestratorConfig {
                task_timeout: Duration::from_secs(2),
            },
        )
    }

    #[tokio::test]
    async fn single_agent_happy_path_completes_session() {
        let context = AgentContext::new(EventBroker::new());
        let registry = AgentRegistry::new(context.clone());
        setup_echo_agent(&context, &registry, "weather.get").await;
        let orchestrator = build_orchestrator(context, registry, "weather.get");

        let session = orchestrator.run("what's the weather").await.unwrap();
        assert_eq!(session.state, SessionState::Completed);
        assert_eq!(session.completed_tasks.len(), 1);
        assert!(session.synthesis.unwrap().contains("echoed"));
    }

    #[tokio::test]
    async fn unroutable_task_fails_the_session() {
        let context = AgentContext::new(EventBroker::new());
        let registry = AgentRegistry::new(context.clone());
        // No agent registered for "weather.get".
        let orchestrator = build_orchestrator(context, registry, "weather.get");

        let session = orchestrator.run("what's the weather").await.unwrap();
        assert_eq!(session.state, SessionState::Failed);
    }

    struct OptionalUnroutablePlanner;

    #[async_trait]
    impl PlannerTool for OptionalUnroutablePlanner {
        fn name(&self) -> &'static str {
            "optional-unroutable"
        }

        async fn decompose(&self, _request: PlanRequest) -> Result<PlanResponse> {
            Ok(PlanResponse {
                tasks: vec![PlannedTask {
                    agent_type: "nobody.home".into(),
                    parameters: Value::Null,
                    optional: true,
                    ..Default::default()
                }],
            })
        }
    }

    #[tokio::test]
    async fn a_failed_optional_task_does_not_fail_the_session() {
        let context = AgentContext::new(EventBroker::new());
        let registry = AgentRegistry::new(context.clone());
        let tracker = CorrelationTracker::new();
        let planner = Arc::new(TaskPlanningEngine::new(
            Arc::new(OptionalUnroutablePlanner),
            Arc::new(OptionalUnroutablePlanner),
        ));
        let synthesizer = Arc::new(Synthesizer::new(None));
        let orchestrator = Orchestrator::new(
            context,
            registry,
            tracker,
            planner,
            synthesizer,
            MetricsRegistry::new(),
            OrchestratorConfig {
                task_timeout: Duration::from_secs(2),
            },
        );

        let session = orchestrator.run("try something optional").await.unwrap();
        assert_eq!(session.state, SessionState::Completed);
    }
}
