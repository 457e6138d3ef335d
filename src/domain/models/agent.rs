//! Agent domain model.
//!
//! Agent behavior is a single `Agent` trait (see
//! `domain::ports::agent::Agent`); this module holds the plain
//! lifecycle-state enum and capability descriptor that sit alongside it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::models::ids::AgentId;

/// Lifecycle state of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Created,
    Inactive,
    Active,
    Destroyed,
}

impl AgentState {
    /// Whether `to` is a legal transition from `self`:
    /// `CREATED -> INACTIVE -> ACTIVE -> INACTIVE -> DESTROYED`, with
    /// `DESTROYED` terminal and `deactivate` idempotent (`INACTIVE ->
    /// INACTIVE` allowed).
    pub fn can_transition_to(&self, to: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, to),
            (Created, Inactive)
                | (Inactive, Active)
                | (Active, Inactive)
                | (Inactive, Inactive)
                | (Created, Destroyed)
                | (Inactive, Destroyed)
                | (Active, Destroyed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Destroyed => "destroyed",
        }
    }
}

/// Capability descriptor produced by registry scans and consumed by the
/// planner as grounding context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: AgentId,
    pub description: String,
    pub capabilities: HashSet<String>,
}

impl AgentInfo {
    pub fn new(
        agent_id: impl Into<AgentId>,
        description: impl Into<String>,
        capabilities: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            description: description.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Registration record the [`AgentContext`](crate::services::agent_context::AgentContext)
/// owns for a single agent.
#[derive(Debug, Clone)]
pub struct AgentRegistration {
    pub agent_id: AgentId,
    pub state: AgentState,
    pub subscriptions: HashSet<String>,
    pub capabilities: HashSet<String>,
}

impl AgentRegistration {
    pub fn new(agent_id: AgentId, capabilities: HashSet<String>) -> Self {
        Self {
            agent_id,
            state: AgentState::Created,
            subscriptions: HashSet::new(),
            capabilities,
        }
    }
}
