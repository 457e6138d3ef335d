//! Agent context: the service an agent
//! uses to join the mesh, subscribe/publish, and move through its
//! lifecycle. Owns the registration table exclusively — the broker owns
//! subscriptions, this owns agent state.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::domain::errors::{MeshError, MeshResult};
use crate::domain::models::{AgentId, AgentRegistration, AgentState, Event, Subscription};
use crate::domain::ports::Agent;
use crate::services::event_broker::EventBroker;

/// Published whenever an agent successfully activates.
pub const AGENT_JOIN_TOPIC: &str = "io.amcp.agent.join";
/// Published whenever an agent deactivates or is destroyed, so
/// listeners (e.g. [`crate::services::agent_registry::AgentRegistry`])
/// can drop it without polling agent state directly.
pub const AGENT_LEAVE_TOPIC: &str = "io.amcp.agent.leave";

/// Per-agent handle into the mesh. Created
/// once per agent by [`AgentContext::register`].
#[derive(Clone)]
pub struct AgentContext {
    broker: EventBroker,
    registrations: Arc<DashMap<AgentId, AgentRegistration>>,
}

impl AgentContext {
    pub fn new(broker: EventBroker) -> Self {
        Self {
            broker,
            registrations: Arc::new(DashMap::new()),
        }
    }

    pub fn broker(&self) -> &EventBroker {
        &self.broker
    }

    /// Register `agent` at `Created` state. Rejects a
    /// second registration under the same id.
    pub fn register(&self, agent: &dyn Agent) -> MeshResult<()> {
        let agent_id = agent.agent_id();
        if self.registrations.contains_key(&agent_id) {
            return Err(MeshError::AgentAlreadyRegistered(agent_id.to_string()));
        }
        let capabilities = agent.capabilities().into_iter().collect();
        self.registrations
            .insert(agent_id.clone(), AgentRegistration::new(agent_id.clone(), capabilities));
        info!(agent = %agent_id, "agent registered");
        Ok(())
    }

    /// Move an agent to `Active`, running its `on_activate` hook
    /// before committing the transition. If the hook fails, the agent is
    /// rolled back to `Inactive` rather than left marked `Active` with a
    /// hook that never ran to completion.
    pub async fn activate(&self, agent: &dyn Agent) -> MeshResult<()> {
        let agent_id = agent.agent_id();
        self.transition(&agent_id, AgentState::Inactive)?;
        if let Err(err) = agent.on_activate().await {
            return Err(err);
        }
        self.transition(&agent_id, AgentState::Active)?;
        info!(agent = %agent_id, "agent activated");
        let capabilities: Vec<String> = self
            .registrations
            .get(&agent_id)
            .map(|r| r.capabilities.iter().cloned().collect())
            .unwrap_or_default();
        self.publish(
            Event::builder(AGENT_JOIN_TOPIC)
                .payload(serde_json::json!({
                    "agent_id": agent_id.to_string(),
                    "capabilities": capabilities,
                }))
                .build()?,
        )
        .await;
        Ok(())
    }

    /// Move an agent back to `Inactive`, unsubscribing it from every
    /// pattern and running its `on_deactivate` hook.
    pub async fn deactivate(&self, agent: &dyn Agent) -> MeshResult<()> {
        let agent_id = agent.agent_id();
        self.transition(&agent_id, AgentState::Inactive)?;
        self.broker.unsubscribe_all(&agent_id);
        agent.on_deactivate().await?;
        info!(agent = %agent_id, "agent deactivated");
        self.publish_leave(&agent_id).await;
        Ok(())
    }

    /// Permanently remove `agent_id` from the mesh:
    /// unsubscribes everything and marks the registration `Destroyed`.
    /// A destroyed agent id can never be reused.
    pub async fn destroy(&self, agent_id: &AgentId) -> MeshResult<()> {
        self.transition(agent_id, AgentState::Destroyed)?;
        self.broker.unsubscribe_all(agent_id);
        info!(agent = %agent_id, "agent destroyed");
        self.publish_leave(agent_id).await;
        Ok(())
    }

    async fn publish_leave(&self, agent_id: &AgentId) {
        if let Ok(event) = Event::builder(AGENT_LEAVE_TOPIC)
            .payload(serde_json::json!({"agent_id": agent_id.to_string()}))
            .build()
        {
            self.publish(event).await;
        }
    }

    fn transition(&self, agent_id: &AgentId, to: AgentState) -> MeshResult<()> {
        let mut registration = self
            .registrations
            .get_mut(agent_id)
            .ok_or_else(|| MeshError::AgentNotFound(agent_id.to_string()))?;
        let from = registration.state;
        if !from.can_transition_to(to) {
            return Err(MeshError::InvalidAgentTransition {
                agent_id: agent_id.to_string(),
                from: from.as_str(),
                to: to.as_str(),
            });
        }
        registration.state = to;
        Ok(())
    }

    /// Subscribe `agent_id` to `pattern`, recording the subscription
    /// against the agent's registration and registering the handler with
    /// the broker.
    pub fn subscribe(
        &self,
        agent_id: &AgentId,
        pattern: impl Into<String>,
        handler: Arc<dyn crate::domain::models::EventHandler>,
    ) -> MeshResult<()> {
        if !self.registrations.contains_key(agent_id) {
            return Err(MeshError::AgentNotFound(agent_id.to_string()));
        }
        let pattern = pattern.into();
        self.broker
            .subscribe(Subscription::new(agent_id.clone(), pattern.clone(), handler))?;
        if let Some(mut registration) = self.registrations.get_mut(agent_id) {
            registration.subscriptions.insert(pattern);
        }
        Ok(())
    }

    pub async fn publish(&self, event: Event) {
        self.broker.publish(event).await;
    }

    pub fn state_of(&self, agent_id: &AgentId) -> Option<AgentState> {
        self.registrations.get(agent_id).map(|r| r.state)
    }

    pub fn registered_agents(&self) -> Vec<AgentId> {
        self.registrations.iter().map(|r| r.key().clone()).collect()
    }
}
