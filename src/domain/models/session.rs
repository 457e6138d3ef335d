//! Orchestration session domain model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::models::ids::{PlanId, SessionId, TaskId};
use crate::domain::models::plan::TaskPlan;
use crate::domain::models::task::TaskResult;

/// States an [`OrchestrationSession`] moves through:
/// `CREATED -> PLANNING -> DISPATCHING -> COLLECTING -> SYNTHESIZING ->
/// COMPLETED`, with `FAILED`/`CANCELLED` reachable from any non-terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Planning,
    Dispatching,
    Collecting,
    Synthesizing,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Planning => "planning",
            Self::Dispatching => "dispatching",
            Self::Collecting => "collecting",
            Self::Synthesizing => "synthesizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether `to` is reachable from `self`.
    pub fn can_transition_to(&self, to: SessionState) -> bool {
        use SessionState::*;
        if self.is_terminal() {
            return false;
        }
        if matches!(to, Failed | Cancelled) {
            return true;
        }
        matches!(
            (self, to),
            (Created, Planning)
                | (Planning, Dispatching)
                | (Dispatching, Collecting)
                | (Collecting, Dispatching) // next wave
                | (Collecting, Synthesizing)
                | (Synthesizing, Completed)
        )
    }
}

/// Live state for one orchestration request from submission to
/// completion. Owned exclusively by the orchestrator; the
/// correlation tracker and plan model never hold a reference back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationSession {
    pub session_id: SessionId,
    pub state: SessionState,
    pub goal: String,
    pub plan_id: Option<PlanId>,
    pub completed_tasks: HashMap<TaskId, TaskResult>,
    pub synthesis: Option<String>,
    pub failure_reason: Option<String>,
}

impl OrchestrationSession {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            session_id: SessionId::new(),
            state: SessionState::Created,
            goal: goal.into(),
            plan_id: None,
            completed_tasks: HashMap::new(),
            synthesis: None,
            failure_reason: None,
        }
    }

    /// Apply a state transition, returning the previous state on success
    /// or leaving the session untouched on an illegal transition.
    pub fn transition(&mut self, to: SessionState) -> Result<SessionState, SessionState> {
        if !self.state.can_transition_to(to) {
            return Err(self.state);
        }
        let from = self.state;
        self.state = to;
        Ok(from)
    }

    pub fn record_task_result(&mut self, result: TaskResult) {
        self.completed_tasks.insert(result.task_id, result);
    }

    pub fn completed_task_ids(&self) -> std::collections::HashSet<TaskId> {
        self.completed_tasks.keys().copied().collect()
    }

    pub fn plan_is_complete(&self, plan: &TaskPlan) -> bool {
        plan.is_complete(&self.completed_task_ids())
    }
}
