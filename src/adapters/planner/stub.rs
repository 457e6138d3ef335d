//! A scripted [`PlannerTool`] for tests and the CLI demo: returns a fixed
//! decomposition regardless of the goal text, so scenario tests don't
//! depend on an external model.

use async_trait::async_trait;

use crate::domain::errors::MeshResult;
use crate::domain::ports::{PlanRequest, PlanResponse, PlannedTask, PlannerTool};

/// Always returns the same `tasks` list, ignoring the incoming goal.
pub struct StubPlannerTool {
    tasks: Vec<PlannedTask>,
}

impl StubPlannerTool {
    pub fn new(tasks: Vec<PlannedTask>) -> Self {
        Self { tasks }
    }

    /// Convenience constructor for a single independent task.
    pub fn single(agent_type: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self::new(vec![PlannedTask::new(agent_type, parameters)])
    }
}

#[async_trait]
impl PlannerTool for StubPlannerTool {
    fn name(&self) -> &'static str {
        "stub-planner"
    }

    async fn decompose(&self, _request: PlanRequest) -> MeshResult<PlanResponse> {
        Ok(PlanResponse {
            tasks: self.tasks.clone(),
        })
    }
}
