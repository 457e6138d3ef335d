//! Task definition and result domain models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::models::ids::TaskId;

/// A single unit of work inside a [`TaskPlan`](crate::domain::models::plan::TaskPlan),
/// addressed to an agent type/capability rather than a specific agent
/// instance (the orchestrator resolves agent type to instance at dispatch
/// time via the registry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_id: TaskId,
    /// Capability or agent-type string the orchestrator routes on, e.g.
    /// `"weather.get"`.
    pub agent_type: String,
    pub parameters: Value,
    /// Ids of sibling tasks in the same plan that must complete before
    /// this one becomes executable.
    pub depends_on: Vec<TaskId>,
    /// Submission-order weight within a level; higher runs first.
    /// Ties break on `task_id` for a stable order. Must be >= 1.
    pub priority: u32,
    /// If `true`, this task failing (unroutable, timed out, or errored)
    /// does not fail the owning session.
    pub optional: bool,
    /// Per-task dispatch deadline. `None` defers to the orchestrator's
    /// configured default.
    pub timeout_ms: Option<u64>,
}

impl TaskDefinition {
    pub fn new(agent_type: impl Into<String>, parameters: Value) -> Self {
        Self {
            task_id: TaskId::new(),
            agent_type: agent_type.into(),
            parameters,
            depends_on: Vec::new(),
            priority: 1,
            optional: false,
            timeout_ms: None,
        }
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.depends_on.extend(deps);
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority.max(1);
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Terminal outcome of a dispatched task, collected by the orchestrator
/// before synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub outcome: TaskOutcome,
    /// Free-form key/value annotations (agent id that handled it, timing,
    /// retry count) kept outside `outcome` so synthesis can stay agnostic
    /// to them.
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success { value: Value },
    Failure { reason: String },
    TimedOut,
    Cancelled,
}

impl TaskResult {
    pub fn success(task_id: TaskId, value: Value) -> Self {
        Self {
            task_id,
            outcome: TaskOutcome::Success { value },
            annotations: HashMap::new(),
        }
    }

    pub fn failure(task_id: TaskId, reason: impl Into<String>) -> Self {
        Self {
            task_id,
            outcome: TaskOutcome::Failure {
                reason: reason.into(),
            },
            annotations: HashMap::new(),
        }
    }

    pub fn timed_out(task_id: TaskId) -> Self {
        Self {
            task_id,
            outcome: TaskOutcome::TimedOut,
            annotations: HashMap::new(),
        }
    }

    pub fn cancelled(task_id: TaskId) -> Self {
        Self {
            task_id,
            outcome: TaskOutcome::Cancelled,
            annotations: HashMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success { .. })
    }
}
