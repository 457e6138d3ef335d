//! Planner tool port. Mirrors the async backend-execution trait elsewhere in this
//! codebase: a single `decompose` call stands in for `execute`, and a
//! `name`/`is_available` pair lets the engine probe a tool before relying
//! on it for the fallback decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::errors::MeshResult;
use crate::domain::models::AgentInfo;

/// Input to a decomposition call: the user-facing goal plus a snapshot of
/// currently known agent capabilities, so the planner can ground tasks in
/// what the mesh can actually execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
    pub known_agents: Vec<AgentInfo>,
}

/// One task as returned by a planner tool, before it has been assigned a
/// [`TaskId`](crate::domain::models::TaskId) or validated into a
/// [`TaskPlan`](crate::domain::models::TaskPlan). `depends_on_index`
/// refers to the position of another `PlannedTask` within the same
/// response, since the tool has no concept of the mesh's generated ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    pub agent_type: String,
    pub parameters: Value,
    #[serde(default)]
    pub depends_on_index: Vec<usize>,
    /// Submission-order weight within a level; higher runs first. Missing
    /// or zero is normalized to 1 (the spec's minimum) when the task is
    /// built.
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Whether this task's failure is allowed to leave the session
    /// otherwise successful.
    #[serde(default)]
    pub optional: bool,
    /// Per-task dispatch deadline in milliseconds; `None` defers to the
    /// orchestrator's configured default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_priority() -> u32 {
    1
}

impl Default for PlannedTask {
    fn default() -> Self {
        Self {
            agent_type: String::new(),
            parameters: Value::Null,
            depends_on_index: Vec::new(),
            priority: default_priority(),
            optional: false,
            timeout_ms: None,
        }
    }
}

impl PlannedTask {
    /// Convenience constructor for an independent, required, default-
    /// priority task — the common case for rule-based/stub planners.
    pub fn new(agent_type: impl Into<String>, parameters: Value) -> Self {
        Self {
            agent_type: agent_type.into(),
            parameters,
            ..Default::default()
        }
    }
}

/// Full decomposition response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlanResponse {
    pub tasks: Vec<PlannedTask>,
}

/// Implemented by anything capable of turning a natural-language goal
/// into a task breakdown: an LLM-backed tool in production, a scripted
/// stub in tests and demos.
#[async_trait]
pub trait PlannerTool: Send + Sync {
    fn name(&self) -> &'static str;

    async fn is_available(&self) -> bool {
        true
    }

    /// Decompose `request.goal` into tasks. A `Result::Ok` with malformed
    /// tasks (dangling `depends_on_index`, cyclic dependencies) is
    /// treated the same as an `Err` by the planning engine: both trigger
    /// the rule-based fallback.
    async fn decompose(&self, request: PlanRequest) -> MeshResult<PlanResponse>;
}
