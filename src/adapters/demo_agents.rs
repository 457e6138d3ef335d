//! Scripted agents used by the CLI demo and integration tests: each
//! answers one capability with a canned response, so the six end-to-end
//! scenarios run without any external dependency.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::errors::MeshResult;
use crate::domain::models::{AgentId, Event, FnHandler};
use crate::domain::ports::Agent;
use crate::services::agent_context::AgentContext;
use crate::services::agent_registry::AgentRegistry;
use crate::services::orchestrator::{task_request_topic, TASK_RESPONSE_TOPIC};

/// An agent that answers every request on its capability with a fixed
/// JSON payload, optionally after an artificial delay (useful for
/// exercising the orchestrator's timeout path).
pub struct ScriptedAgent {
    id: AgentId,
    agent_type: String,
    response: serde_json::Value,
    delay: Duration,
}

impl ScriptedAgent {
    pub fn new(id: impl Into<String>, agent_type: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            id: AgentId::from(id.into()),
            agent_type: agent_type.into(),
            response,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Register, announce, activate, and subscribe this agent in one
    /// call — the sequence every agent goes through before it can
    /// receive dispatched work.
    pub async fn install(self: Arc<Self>, context: &AgentContext, registry: &AgentRegistry) -> MeshResult<()> {
        context.register(self.as_ref())?;
        registry.announce(crate::domain::models::AgentInfo::new(
            self.id.clone(),
            format!("scripted agent for {}", self.agent_type),
            self.capabilities(),
        ));
        context.activate(self.as_ref()).await?;

        let agent = self.clone();
        let context_for_handler = context.clone();
        let handler: Arc<dyn crate::domain::models::EventHandler> = Arc::new(FnHandler(move |event: &Event| {
            let agent = agent.clone();
            let context = context_for_handler.clone();
            let event = event.clone();
            async move {
                if !agent.delay.is_zero() {
                    tokio::time::sleep(agent.delay).await;
                }
                let Some(correlation_id) = event.correlation_id else {
                    return Ok(());
                };
                let response = Event::builder(TASK_RESPONSE_TOPIC)
                    .correlation_id(correlation_id)
                    .sender(agent.id.clone())
                    .payload(agent.response.clone())
                    .build()?;
                context.publish(response).await;
                Ok(())
            }
        }));
        context.subscribe(&self.id, task_request_topic(&self.agent_type), handler)?;
        Ok(())
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn agent_id(&self) -> AgentId {
        self.id.clone()
    }

    fn capabilities(&self) -> Vec<String> {
        vec![self.agent_type.clone()]
    }

    async fn handle_event(&self, _event: &Event) -> MeshResult<()> {
        Ok(())
    }
}

/// A scripted weather agent, for the demo CLI and S1/S3 scenarios.
pub fn weather_agent() -> Arc<ScriptedAgent> {
    Arc::new(ScriptedAgent::new(
        "weather-agent",
        "weather.get",
        json!({"city": "San Francisco", "temp_f": 68, "condition": "foggy"}),
    ))
}

/// A scripted stock-quote agent, for S2 (parallel level).
pub fn stock_agent() -> Arc<ScriptedAgent> {
    Arc::new(ScriptedAgent::new(
        "stock-agent",
        "stock.quote",
        json!({"symbol": "ACME", "price": 101.25}),
    ))
}

/// A scripted chat/summarize agent that depends on upstream task output
/// being available in the synthesized context (S3).
pub fn chat_agent() -> Arc<ScriptedAgent> {
    Arc::new(ScriptedAgent::new(
        "chat-agent",
        "chat.summarize",
        json!({"summary": "it's foggy in SF and ACME is up"}),
    ))
}
