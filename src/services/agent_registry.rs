//! Agent registry: a queryable snapshot
//! of which agents currently advertise which capabilities, kept current
//! by listening to the context's registration table rather than by
//! agents pushing updates themselves.

use std::sync::Arc;

use dashmap::DashMap;

use crate::domain::models::{AgentId, AgentInfo, AgentState, FnHandler, Subscription};
use crate::services::agent_context::{AgentContext, AGENT_JOIN_TOPIC, AGENT_LEAVE_TOPIC};

/// Read-mostly directory of agent capabilities, used by the planning
/// engine to ground task decomposition in what the mesh can actually do.
#[derive(Clone)]
pub struct AgentRegistry {
    directory: Arc<DashMap<AgentId, AgentInfo>>,
    context: AgentContext,
}

impl AgentRegistry {
    /// Builds the registry and wires it to track agent join/leave
    /// directly against the broker — bypassing the per-agent registration
    /// check `AgentContext::subscribe` enforces, the same way the mesh
    /// wires its internal response router, since the registry itself is
    /// never a registered agent.
    ///
    /// A join only fills in an entry that isn't already there: callers
    /// are expected to call [`Self::announce`] with a richer
    /// description before activating, and a join event only carries the
    /// agent id plus its capability list, so letting it unconditionally
    /// overwrite would clobber that richer descriptor with a blank one.
    /// A leave always evicts, unconditionally.
    pub fn new(context: AgentContext) -> Self {
        let directory = Arc::new(DashMap::new());

        let directory_for_join = directory.clone();
        let _ = context.broker().subscribe(Subscription::new(
            AgentId::from("__agent_registry_join_router"),
            AGENT_JOIN_TOPIC,
            Arc::new(FnHandler(move |event: &crate::domain::models::Event| {
                let directory = directory_for_join.clone();
                let payload = event.payload.clone();
                async move {
                    let Some(agent_id) = payload.get("agent_id").and_then(|v| v.as_str()) else {
                        return Ok(());
                    };
                    let agent_id = AgentId::from(agent_id);
                    if directory.contains_key(&agent_id) {
                        return Ok(());
                    }
                    let capabilities = payload
                        .get("capabilities")
                        .and_then(|v| v.as_array())
                        .map(|values| {
                            values
                                .iter()
                                .filter_map(|v| v.as_str())
                                .map(String::from)
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default();
                    directory.insert(agent_id.clone(), AgentInfo::new(agent_id, "", capabilities));
                    Ok(())
                }
            })),
        ));

        let directory_for_leave = directory.clone();
        let _ = context.broker().subscribe(Subscription::new(
            AgentId::from("__agent_registry_leave_router"),
            AGENT_LEAVE_TOPIC,
            Arc::new(FnHandler(move |event: &crate::domain::models::Event| {
                let directory = directory_for_leave.clone();
                let agent_id = event
                    .payload
                    .get("agent_id")
                    .and_then(|v| v.as_str())
                    .map(AgentId::from);
                async move {
                    if let Some(agent_id) = agent_id {
                        directory.remove(&agent_id);
                    }
                    Ok(())
                }
            })),
        ));

        Self { directory, context }
    }

    /// Add or replace an agent's capability descriptor. Called once at
    /// registration time; the descriptor itself does not change over an
    /// agent's lifetime, only its [`AgentState`] does (tracked in
    /// [`AgentContext`], not duplicated here).
    pub fn announce(&self, info: AgentInfo) {
        self.directory.insert(info.agent_id.clone(), info);
    }

    pub fn remove(&self, agent_id: &AgentId) {
        self.directory.remove(agent_id);
    }

    /// Snapshot of every agent currently in `Active` state. Agents that are `Created`, `Inactive`, or
    /// `Destroyed` are excluded — only active agents can actually receive
    /// dispatched work.
    pub fn discover_agents(&self) -> Vec<AgentInfo> {
        self.directory
            .iter()
            .filter(|entry| self.context.state_of(entry.key()) == Some(AgentState::Active))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Active agents advertising `capability`.
    pub fn discover_by_capability(&self, capability: &str) -> Vec<AgentInfo> {
        self.discover_agents()
            .into_iter()
            .filter(|info| info.has_capability(capability))
            .collect()
    }

    #[cfg(test)]
    fn contains(&self, agent_id: &AgentId) -> bool {
        self.directory.contains_key(agent_id)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::domain::errors::MeshResult;
    use crate::domain::models::Event;
    use crate::domain::ports::Agent;
    use crate::services::event_broker::EventBroker;

    struct StubAgent(AgentId, Vec<String>);

    #[async_trait]
    impl Agent for StubAgent {
        fn agent_id(&self) -> AgentId {
            self.0.clone()
        }

        fn capabilities(&self) -> Vec<String> {
            self.1.clone()
        }

        async fn handle_event(&self, _event: &Event) -> MeshResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn only_active_agents_are_discoverable() {
        let ctx = AgentContext::new(EventBroker::new());
        let registry = AgentRegistry::new(ctx.clone());
        let agent = StubAgent(AgentId::from("weather-agent"), vec!["weather.get".into()]);

        ctx.register(&agent).unwrap();
        registry.announce(AgentInfo::new(
            agent.agent_id(),
            "weather",
            agent.capabilities(),
        ));
        assert!(registry.discover_agents().is_empty());

        ctx.activate(&agent).await.unwrap();
        assert_eq!(registry.discover_agents().len(), 1);

        ctx.deactivate(&agent).await.unwrap();
        assert!(registry.discover_agents().is_empty());
    }

    #[tokio::test]
    async fn discover_by_capability_filters_correctly() {
        let ctx = AgentContext::new(EventBroker::new());
        let registry = AgentRegistry::new(ctx.clone());
        let weather = StubAgent(AgentId::from("weather-agent"), vec!["weather.get".into()]);
        let stock = StubAgent(AgentId::from("stock-agent"), vec!["stock.quote".into()]);

        for agent in [&weather, &stock] {
            ctx.register(agent).unwrap();
            registry.announce(AgentInfo::new(agent.agent_id(), "x", agent.capabilities()));
            ctx.activate(agent).await.unwrap();
        }

        let found = registry.discover_by_capability("weather.get");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_id, AgentId::from("weather-agent"));
    }

    #[tokio::test]
    async fn agent_join_event_auto_populates_an_unannounced_agent() {
        let ctx = AgentContext::new(EventBroker::new());
        let registry = AgentRegistry::new(ctx.clone());
        let agent = StubAgent(AgentId::from("weather-agent"), vec!["weather.get".into()]);

        // no announce() call first
        ctx.register(&agent).unwrap();
        assert!(!registry.contains(&agent.0));

        ctx.activate(&agent).await.unwrap();
        assert!(registry.contains(&agent.0));
        assert_eq!(registry.discover_by_capability("weather.get").len(), 1);
    }

    #[tokio::test]
    async fn agent_join_event_does_not_clobber_an_existing_announcement() {
        let ctx = AgentContext::new(EventBroker::new());
        let registry = AgentRegistry::new(ctx.clone());
        let agent = StubAgent(AgentId::from("weather-agent"), vec!["weather.get".into()]);

        ctx.register(&agent).unwrap();
        registry.announce(AgentInfo::new(agent.agent_id(), "the weather oracle", agent.capabilities()));
        ctx.activate(&agent).await.unwrap();

        let info = registry.discover_agents().into_iter().next().unwrap();
        assert_eq!(info.description, "the weather oracle");
    }

    #[tokio::test]
    async fn agent_leave_event_auto_evicts_the_directory_entry() {
        let ctx = AgentContext::new(EventBroker::new());
        let registry = AgentRegistry::new(ctx.clone());
        let agent = StubAgent(AgentId::from("weather-agent"), vec!["weather.get".into()]);

        ctx.register(&agent).unwrap();
        registry.announce(AgentInfo::new(agent.agent_id(), "weather", agent.capabilities()));
        ctx.activate(&agent).await.unwrap();
        assert!(registry.contains(&agent.0));

        ctx.destroy(&agent.0).await.unwrap();
        assert!(!registry.contains(&agent.0));
    }
}
