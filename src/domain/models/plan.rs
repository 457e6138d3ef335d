//! Task plan DAG model.
//!
//! Mirrors the shape of a dependency-graph model seen elsewhere in this
//! codebase: nodes keyed by id, cycle detection via DFS recursion-stack,
//! and wave/level grouping via repeated ready-set extraction. Reworked
//! here around [`TaskDefinition`] rather than a mutable task record, since
//! a plan's dependency structure is fixed at construction and only task
//! *status* (tracked separately, see orchestrator) changes afterward.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::errors::{MeshError, MeshResult};
use crate::domain::models::ids::{PlanId, TaskId};
use crate::domain::models::task::TaskDefinition;

/// A validated, immutable task dependency graph produced by the planning
/// engine. Construction is the only place validation
/// happens; once built, a `TaskPlan` is guaranteed acyclic with no
/// dangling dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    pub plan_id: PlanId,
    pub tasks: HashMap<TaskId, TaskDefinition>,
}

impl TaskPlan {
    /// Validate and construct a plan from a flat task list.
    pub fn new(tasks: Vec<TaskDefinition>) -> MeshResult<Self> {
        let mut map = HashMap::with_capacity(tasks.len());
        for task in tasks {
            if map.insert(task.task_id, task).is_some() {
                return Err(MeshError::InvalidPlan("duplicate task id in plan".into()));
            }
        }
        for task in map.values() {
            for dep in &task.depends_on {
                if !map.contains_key(dep) {
                    return Err(MeshError::InvalidPlan(format!(
                        "task {} depends on unknown task {}",
                        task.task_id, dep
                    )));
                }
            }
        }
        let plan = Self {
            plan_id: PlanId::new(),
            tasks: map,
        };
        if plan.has_cycle() {
            return Err(MeshError::InvalidPlan("dependency cycle detected".into()));
        }
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    fn has_cycle(&self) -> bool {
        #[derive(PartialEq, Eq, Clone, Copy)]
        enum Mark {
            Grey,
            Black,
        }
        let mut marks: HashMap<TaskId, Mark> = HashMap::new();

        fn visit(
            id: TaskId,
            tasks: &HashMap<TaskId, TaskDefinition>,
            marks: &mut HashMap<TaskId, Mark>,
        ) -> bool {
            match marks.get(&id) {
                Some(Mark::Grey) => return true,
                Some(Mark::Black) => return false,
                None => {}
            }
            marks.insert(id, Mark::Grey);
            if let Some(task) = tasks.get(&id) {
                for &dep in &task.depends_on {
                    if visit(dep, tasks, marks) {
                        return true;
                    }
                }
            }
            marks.insert(id, Mark::Black);
            false
        }

        self.tasks
            .keys()
            .any(|&id| visit(id, &self.tasks, &mut marks))
    }

    /// Group tasks into execution levels/waves: level 0
    /// holds every task with no dependencies, level N holds tasks whose
    /// dependencies all finish by level N-1. Tasks within a level may run
    /// concurrently; they are ordered by descending priority (ties broken
    /// by ascending `task_id`) as a best-effort submission order.
    pub fn execution_levels(&self) -> Vec<Vec<TaskId>> {
        let mut levels = Vec::new();
        let mut remaining: HashSet<TaskId> = self.tasks.keys().copied().collect();
        let mut completed: HashSet<TaskId> = HashSet::new();

        while !remaining.is_empty() {
            let mut level: Vec<TaskId> = remaining
                .iter()
                .filter(|id| {
                    self.tasks
                        .get(id)
                        .map(|task| task.depends_on.iter().all(|d| completed.contains(d)))
                        .unwrap_or(false)
                })
                .copied()
                .collect();

            debug_assert!(
                !level.is_empty(),
                "validated plans cannot stall: has_cycle() would have rejected this"
            );

            self.sort_by_priority(&mut level);

            for id in &level {
                remaining.remove(id);
                completed.insert(*id);
            }
            levels.push(level);
        }

        levels
    }

    /// Tasks that are ready to run right now, given the set of already
    /// completed task ids, sorted by descending priority with a stable
    /// ascending-`task_id` tie-break.
    pub fn next_executable_tasks(&self, completed: &HashSet<TaskId>) -> Vec<TaskId> {
        let mut ready: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|task| !completed.contains(&task.task_id))
            .filter(|task| task.depends_on.iter().all(|d| completed.contains(d)))
            .map(|task| task.task_id)
            .collect();
        self.sort_by_priority(&mut ready);
        ready
    }

    /// Sort `ids` by descending `priority`, breaking ties by ascending
    /// `task_id` for a deterministic, stable submission order.
    fn sort_by_priority(&self, ids: &mut [TaskId]) {
        ids.sort_by(|a, b| {
            let pa = self.tasks.get(a).map_or(1, |t| t.priority);
            let pb = self.tasks.get(b).map_or(1, |t| t.priority);
            pb.cmp(&pa).then_with(|| a.cmp(b))
        });
    }

    /// `true` once every task id in the plan is in `completed`.
    pub fn is_complete(&self, completed: &HashSet<TaskId>) -> bool {
        self.tasks.keys().all(|id| completed.contains(id))
    }

    /// Rough wall-clock estimate for the whole plan: levels run
    /// sequentially and tasks within a level run concurrently, so this is
    /// the sum, over each execution level, of that level's slowest task
    /// timeout. Tasks with no explicit timeout are assumed to take
    /// `DEFAULT_TASK_TIMEOUT_MS`, matching the orchestrator's default
    /// task timeout.
    pub fn estimated_duration_ms(&self) -> u64 {
        self.execution_levels()
            .iter()
            .map(|level| {
                level
                    .iter()
                    .filter_map(|id| self.tasks.get(id))
                    .map(|task| task.timeout_ms.unwrap_or(DEFAULT_TASK_TIMEOUT_MS))
                    .max()
                    .unwrap_or(0)
            })
            .sum()
    }
}

/// Default per-task timeout assumed when estimating a plan's duration and
/// the task doesn't set its own `timeout_ms`.
const DEFAULT_TASK_TIMEOUT_MS: u64 = 30_000;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn rejects_duplicate_task_id() {
        let a = TaskDefinition::new("x", Value::Null);
        let mut b = TaskDefinition::new("y", Value::Null);
        b.task_id = a.task_id;
        let err = TaskPlan::new(vec![a, b]).unwrap_err();
        assert!(matches!(err, MeshError::InvalidPlan(_)));
    }

    #[test]
    fn rejects_dangling_dependency() {
        let a = TaskDefinition::new("x", Value::Null).depends_on([TaskId::new()]);
        let err = TaskPlan::new(vec![a]).unwrap_err();
        assert!(matches!(err, MeshError::InvalidPlan(_)));
    }

    #[test]
    fn rejects_cycle() {
        let a = TaskDefinition::new("a", Value::Null);
        let b = TaskDefinition::new("b", Value::Null).depends_on([a.task_id]);
        let mut a = a;
        a.depends_on.push(b.task_id);
        let err = TaskPlan::new(vec![a, b]).unwrap_err();
        assert!(matches!(err, MeshError::InvalidPlan(_)));
    }

    #[test]
    fn single_task_has_one_level() {
        let a = TaskDefinition::new("x", Value::Null);
        let plan = TaskPlan::new(vec![a]).unwrap();
        assert_eq!(plan.execution_levels().len(), 1);
    }

    #[test]
    fn diamond_dependency_groups_into_three_levels() {
        let a = TaskDefinition::new("a", Value::Null);
        let b = TaskDefinition::new("b", Value::Null).depends_on([a.task_id]);
        let c = TaskDefinition::new("c", Value::Null).depends_on([a.task_id]);
        let d = TaskDefinition::new("d", Value::Null).depends_on([b.task_id, c.task_id]);
        let plan = TaskPlan::new(vec![a, b, c, d]).unwrap();
        let levels = plan.execution_levels();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].len(), 1);
        assert_eq!(levels[1].len(), 2);
        assert_eq!(levels[2].len(), 1);
    }

    #[test]
    fn next_executable_tasks_respects_completion_set() {
        let a = TaskDefinition::new("a", Value::Null);
        let b = TaskDefinition::new("b", Value::Null).depends_on([a.task_id]);
        let a_id = a.task_id;
        let b_id = b.task_id;
        let plan = TaskPlan::new(vec![a, b]).unwrap();

        let none_done: HashSet<TaskId> = HashSet::new();
        assert_eq!(plan.next_executable_tasks(&none_done), vec![a_id]);

        let mut a_done = HashSet::new();
        a_done.insert(a_id);
        assert_eq!(plan.next_executable_tasks(&a_done), vec![b_id]);
        assert!(!plan.is_complete(&a_done));

        let mut all_done = a_done;
        all_done.insert(b_id);
        assert!(plan.is_complete(&all_done));
    }

    #[test]
    fn estimated_duration_sums_max_timeout_per_level() {
        let a = TaskDefinition::new("a", Value::Null).timeout_ms(1_000);
        let b = TaskDefinition::new("b", Value::Null).depends_on([a.task_id]).timeout_ms(2_000);
        let c = TaskDefinition::new("c", Value::Null).depends_on([a.task_id]);
        let d = TaskDefinition::new("d", Value::Null).depends_on([b.task_id, c.task_id]).timeout_ms(500);
        let plan = TaskPlan::new(vec![a, b, c, d]).unwrap();

        // level 0: [a] -> 1_000
        // level 1: [b, c] -> max(2_000, DEFAULT_TASK_TIMEOUT_MS)
        // level 2: [d] -> 500
        let expected = 1_000 + DEFAULT_TASK_TIMEOUT_MS + 500;
        assert_eq!(plan.estimated_duration_ms(), expected);
    }

    proptest::proptest! {
        #[test]
        fn a_linear_chain_produces_one_task_per_level_in_order(chain_len in 1usize..12) {
            let mut tasks = Vec::with_capacity(chain_len);
            let mut previous: Option<TaskId> = None;
            for i in 0..chain_len {
                let mut task = TaskDefinition::new(format!("task-{i}"), Value::Null);
                if let Some(prev) = previous {
                    task = task.depends_on([prev]);
                }
                previous = Some(task.task_id);
                tasks.push(task);
            }
            let plan = TaskPlan::new(tasks).unwrap();
            let levels = plan.execution_levels();
            proptest::prop_assert_eq!(levels.len(), chain_len);
            proptest::prop_assert!(levels.iter().all(|level| level.len() == 1));
        }

        #[test]
        fn execution_levels_cover_every_task_exactly_once(fan_out in 1usize..8) {
            let root = TaskDefinition::new("root", Value::Null);
            let root_id = root.task_id;
            let mut tasks = vec![root];
            for i in 0..fan_out {
                tasks.push(TaskDefinition::new(format!("leaf-{i}"), Value::Null).depends_on([root_id]));
            }
            let expected_total = tasks.len();
            let plan = TaskPlan::new(tasks).unwrap();
            let levels = plan.execution_levels();
            let covered: usize = levels.iter().map(Vec::len).sum();
            proptest::prop_assert_eq!(covered, expected_total);
            proptest::prop_assert_eq!(levels.len(), 2);
        }
    }
}
