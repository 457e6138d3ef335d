//! Task planning engine: turns a goal
//! into a validated [`TaskPlan`] by delegating decomposition to a
//! [`PlannerTool`], falling back to a rule-based planner when the primary
//! tool is unavailable, errors, or returns a plan that fails validation.

use std::sync::Arc;

use tracing::warn;

use crate::domain::errors::MeshResult;
use crate::domain::models::{AgentInfo, TaskDefinition, TaskId, TaskPlan};
use crate::domain::ports::{PlanRequest, PlannedTask, PlannerTool};

/// Decomposes goals into plans, preferring `primary` and degrading to
/// `fallback` whenever `primary` cannot produce a usable plan. `fallback` is expected to be total — it must always produce
/// *some* valid plan, even a single catch-all task, since there is
/// nothing left to fall back to after it.
pub struct TaskPlanningEngine {
    primary: Arc<dyn PlannerTool>,
    fallback: Arc<dyn PlannerTool>,
}

impl TaskPlanningEngine {
    pub fn new(primary: Arc<dyn PlannerTool>, fallback: Arc<dyn PlannerTool>) -> Self {
        Self { primary, fallback }
    }

    pub async fn plan(&self, goal: impl Into<String>, known_agents: Vec<AgentInfo>) -> MeshResult<TaskPlan> {
        let goal = goal.into();
        let request = PlanRequest {
            goal: goal.clone(),
            known_agents: known_agents.clone(),
        };

        if self.primary.is_available().await {
            match self.primary.decompose(request).await {
                Ok(response) => match to_plan(response.tasks) {
                    Ok(plan) if !plan.is_empty() => return Ok(plan),
                    Ok(_) => warn!(tool = self.primary.name(), "planner returned an empty plan, falling back"),
                    Err(err) => warn!(tool = self.primary.name(), %err, "planner returned an invalid plan, falling back"),
                },
                Err(err) => warn!(tool = self.primary.name(), %err, "planner call failed, falling back"),
            }
        } else {
            warn!(tool = self.primary.name(), "planner unavailable, falling back");
        }

        let fallback_request = PlanRequest { goal, known_agents };
        let response = self.fallback.decompose(fallback_request).await?;
        to_plan(response.tasks)
    }
}

/// Resolve `depends_on_index` references into real [`TaskId`]s and
/// validate the result as a [`TaskPlan`].
fn to_plan(planned: Vec<PlannedTask>) -> MeshResult<TaskPlan> {
    let ids: Vec<TaskId> = (0..planned.len()).map(|_| TaskId::new()).collect();
    let mut tasks = Vec::with_capacity(planned.len());
    for (i, task) in planned.into_iter().enumerate() {
        let mut deps = Vec::with_capacity(task.depends_on_index.len());
        for idx in task.depends_on_index {
            match ids.get(idx) {
                Some(&id) => deps.push(id),
                None => {
                    return Err(crate::domain::errors::MeshError::InvalidPlan(format!(
                        "task {i} depends_on_index {idx} is out of range"
                    )))
                }
            }
        }
        let mut definition = TaskDefinition::new(task.agent_type, task.parameters)
            .depends_on(deps)
            .priority(task.priority)
            .optional(task.optional);
        if let Some(timeout_ms) = task.timeout_ms {
            definition = definition.timeout_ms(timeout_ms);
        }
        definition.task_id = ids[i];
        tasks.push(definition);
    }
    TaskPlan::new(tasks)
}
