//! Agent port: the trait every mesh participant implements. Shaped after the async backend trait elsewhere in this
//! codebase (name/is_available/execute-style methods), trimmed to the
//! lifecycle hooks and single event handler a mesh agent actually needs.

use async_trait::async_trait;

use crate::domain::errors::MeshResult;
use crate::domain::models::{AgentId, Event};

/// Implemented by anything that can be registered with an
/// [`AgentContext`](crate::services::agent_context::AgentContext) and
/// receive events over the mesh.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier this agent registers and subscribes under.
    fn agent_id(&self) -> AgentId;

    /// Capability/agent-type strings this agent advertises to the
    /// registry and planner.
    fn capabilities(&self) -> Vec<String>;

    /// Called while activating, before the agent is marked `Active` — a
    /// failure here leaves the agent `Inactive` instead of `Active`.
    /// Implementations typically subscribe to the topics they handle
    /// here.
    async fn on_activate(&self) -> MeshResult<()> {
        Ok(())
    }

    /// Called when the agent transitions back to `Inactive`.
    async fn on_deactivate(&self) -> MeshResult<()> {
        Ok(())
    }

    /// Handle one event delivered to a subscription this agent owns.
    async fn handle_event(&self, event: &Event) -> MeshResult<()>;
}
