//! Top-level facade that wires the broker, agent context, registry,
//! correlation tracker, planning engine, synthesizer, and orchestrator
//! into one runtime.

use std::sync::Arc;

use crate::adapters::planner::{KeywordRoute, RuleBasedPlanner};
use crate::domain::ports::{Agent, PlannerTool};
use crate::infrastructure::config::MeshConfig;
use crate::services::agent_context::AgentContext;
use crate::services::agent_registry::AgentRegistry;
use crate::services::correlation_tracker::CorrelationTracker;
use crate::services::event_broker::EventBroker;
use crate::services::metrics::MetricsRegistry;
use crate::services::orchestrator::{
    Orchestrator, OrchestratorConfig, ORCHESTRATION_REQUEST_TOPIC, TASK_RESPONSE_TOPIC,
};
use crate::services::synthesizer::{SynthesisTool, Synthesizer};
use crate::services::task_planning_engine::TaskPlanningEngine;

/// Builder for [`Mesh`]. A primary planner is optional; the rule-based
/// fallback is always wired in since the planning engine requires a
/// total fallback.
pub struct MeshBuilder {
    config: MeshConfig,
    primary_planner: Option<Arc<dyn PlannerTool>>,
    fallback_routes: Vec<KeywordRoute>,
    synthesis_tool: Option<Arc<dyn SynthesisTool>>,
}

impl MeshBuilder {
    pub fn new(config: MeshConfig) -> Self {
        Self {
            config,
            primary_planner: None,
            fallback_routes: Vec::new(),
            synthesis_tool: None,
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn PlannerTool>) -> Self {
        self.primary_planner = Some(planner);
        self
    }

    pub fn with_fallback_routes(mut self, routes: Vec<KeywordRoute>) -> Self {
        self.fallback_routes = routes;
        self
    }

    pub fn with_synthesis_tool(mut self, tool: Arc<dyn SynthesisTool>) -> Self {
        self.synthesis_tool = Some(tool);
        self
    }

    pub fn build(self) -> Mesh {
        let broker = EventBroker::new();
        let context = AgentContext::new(broker.clone());
        let registry = AgentRegistry::new(context.clone());
        let tracker = CorrelationTracker::new();

        // Route task responses into the correlation tracker regardless
        // of which orchestrator dispatched the request.
        let tracker_for_routing = tracker.clone();
        let _ = context.broker().subscribe(crate::domain::models::Subscription::new(
            crate::domain::models::AgentId::from("__mesh_response_router"),
            TASK_RESPONSE_TOPIC,
            Arc::new(crate::domain::models::FnHandler(move |event: &crate::domain::models::Event| {
                let tracker = tracker_for_routing.clone();
                let event = event.clone();
                async move {
                    tracker.complete(event);
                    Ok(())
                }
            })),
        ));

        let fallback: Arc<dyn PlannerTool> = Arc::new(RuleBasedPlanner::new(self.fallback_routes));
        let primary = self.primary_planner.unwrap_or_else(|| fallback.clone());
        let planning_engine = Arc::new(TaskPlanningEngine::new(primary, fallback));
        let synthesizer = Arc::new(Synthesizer::new(self.synthesis_tool));
        let metrics = MetricsRegistry::new();

        let orchestrator = Orchestrator::new(
            context.clone(),
            registry.clone(),
            tracker.clone(),
            planning_engine,
            synthesizer,
            metrics,
            OrchestratorConfig {
                task_timeout: self.config.task_timeout(),
            },
        );

        // Let a goal be submitted by publishing to orchestration.request
        // instead of calling `Mesh::run` directly, the way a specialist
        // agent or an external producer on the mesh would. The run itself
        // is spawned rather than awaited inline, so publishing the
        // request returns immediately; callers that need the resulting
        // session look it up afterward via `Orchestrator::session`.
        let orchestrator_for_requests = orchestrator.clone();
        let _ = context.broker().subscribe(crate::domain::models::Subscription::new(
            crate::domain::models::AgentId::from("__mesh_orchestration_request_router"),
            ORCHESTRATION_REQUEST_TOPIC,
            Arc::new(crate::domain::models::FnHandler(move |event: &crate::domain::models::Event| {
                let orchestrator = orchestrator_for_requests.clone();
                let query = event
                    .payload
                    .get("query")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned);
                async move {
                    if let Some(query) = query {
                        tokio::spawn(async move {
                            let _ = orchestrator.run(query).await;
                        });
                    }
                    Ok(())
                }
            })),
        ));

        Mesh {
            context,
            registry,
            orchestrator,
        }
    }
}

/// The assembled runtime: register agents against it, then call
/// [`Mesh::run`] to plan and execute a goal end to end.
#[derive(Clone)]
pub struct Mesh {
    context: AgentContext,
    registry: AgentRegistry,
    orchestrator: Orchestrator,
}

impl Mesh {
    pub fn context(&self) -> &AgentContext {
        &self.context
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Register and activate `agent`, announcing its capabilities to the
    /// registry in one call.
    pub async fn register_agent(&self, agent: &dyn Agent) -> crate::domain::errors::MeshResult<()> {
        self.context.register(agent)?;
        self.registry.announce(crate::domain::models::AgentInfo::new(
            agent.agent_id(),
            "",
            agent.capabilities(),
        ));
        self.context.activate(agent).await
    }

    pub async fn run(&self, goal: impl Into<String>) -> crate::domain::errors::MeshResult<crate::domain::models::OrchestrationSession> {
        self.orchestrator.run(goal).await
    }
}
