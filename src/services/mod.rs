//! Services: the stateful machinery built on top of the domain models.

pub mod agent_context;
pub mod agent_registry;
pub mod correlation_tracker;
pub mod event_broker;
pub mod metrics;
pub mod orchestrator;
pub mod synthesizer;
pub mod task_planning_engine;
pub mod topic_matcher;

pub use agent_context::AgentContext;
pub use agent_registry::AgentRegistry;
pub use correlation_tracker::{CorrelationTracker, CorrelationWaiter};
pub use event_broker::{BrokerStats, EventBroker};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use synthesizer::{ConcatenatingSynthesizer, SynthesisTool, Synthesizer};
pub use task_planning_engine::TaskPlanningEngine;
