pub mod rule_based;
pub mod stub;

pub use rule_based::{KeywordRoute, RuleBasedPlanner};
pub use stub::StubPlannerTool;
