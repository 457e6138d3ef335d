//! Rule-based planner: scans
//! the goal text for keywords mapped to known agent capabilities and
//! emits one independent task per match, falling back further to a
//! single catch-all `general` task when nothing matches. This planner
//! can never fail and never needs its own fallback — it is the floor the
//! planning engine rests on.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::errors::MeshResult;
use crate::domain::ports::{PlanRequest, PlanResponse, PlannedTask, PlannerTool};

/// `(keyword, agent_type)` pairs checked case-insensitively against the
/// goal text, in order.
#[derive(Debug, Clone)]
pub struct KeywordRoute {
    pub keyword: String,
    pub agent_type: String,
}

impl KeywordRoute {
    pub fn new(keyword: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            agent_type: agent_type.into(),
        }
    }
}

pub struct RuleBasedPlanner {
    routes: Vec<KeywordRoute>,
}

impl RuleBasedPlanner {
    pub fn new(routes: Vec<KeywordRoute>) -> Self {
        Self { routes }
    }

    /// Build routes from whatever capabilities the registry currently
    /// knows about, matching each capability's last dotted segment as
    /// the keyword (`"weather.get"` matches the word "get"... too
    /// generic in practice, so callers normally supply explicit routes
    /// via [`Self::new`] instead; this exists for a zero-configuration
    /// demo path).
    pub fn from_capability_names(capabilities: impl IntoIterator<Item = String>) -> Self {
        let routes = capabilities
            .into_iter()
            .map(|cap| {
                let keyword = cap.split('.').next().unwrap_or(&cap).to_string();
                KeywordRoute::new(keyword, cap)
            })
            .collect();
        Self::new(routes)
    }
}

#[async_trait]
impl PlannerTool for RuleBasedPlanner {
    fn name(&self) -> &'static str {
        "rule-based-planner"
    }

    async fn decompose(&self, request: PlanRequest) -> MeshResult<PlanResponse> {
        let lower_goal = request.goal.to_lowercase();
        let mut tasks: Vec<PlannedTask> = self
            .routes
            .iter()
            .filter(|route| lower_goal.contains(&route.keyword.to_lowercase()))
            .map(|route| PlannedTask::new(route.agent_type.clone(), json!({"goal": request.goal})))
            .collect();

        if tasks.is_empty() {
            tasks.push(PlannedTask::new("general", json!({"goal": request.goal})));
        }

        Ok(PlanResponse { tasks })
    }
}
