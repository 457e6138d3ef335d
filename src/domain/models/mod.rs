//! Domain model types: the nouns of the mesh, free of any I/O.

pub mod agent;
pub mod event;
pub mod ids;
pub mod plan;
pub mod session;
pub mod subscription;
pub mod task;

pub use agent::{AgentInfo, AgentRegistration, AgentState};
pub use event::{DeliveryOptions, Event, EventBuilder};
pub use ids::{AgentId, CorrelationId, EventId, PlanId, SessionId, TaskId};
pub use plan::TaskPlan;
pub use session::{OrchestrationSession, SessionState};
pub use subscription::{EventHandler, FnHandler, Subscription};
pub use task::{TaskDefinition, TaskOutcome, TaskResult};
