//! Ports: trait boundaries the domain depends on but does not implement.

pub mod agent;
pub mod planner_tool;

pub use agent::Agent;
pub use planner_tool::{PlanRequest, PlanResponse, PlannedTask, PlannerTool};
