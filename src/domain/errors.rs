//! Crate-wide error taxonomy for the AMCP mesh.

use thiserror::Error;

use crate::domain::models::{CorrelationId, SessionId};

/// Mesh-level errors that can occur anywhere in the broker, tracker,
/// registry, plan model, or orchestrator.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A topic or subscription pattern failed validation (empty segment,
    /// embedded `**`, empty topic/pattern string).
    #[error("invalid topic pattern: {0}")]
    InvalidPattern(String),

    /// A published topic was malformed (currently: empty).
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// Correlation creation or task parsing was rejected.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The planner tool failed *and* the rule-based fallback also produced
    /// an invalid plan. Spec calls this theoretically unreachable because
    /// the fallback is total; surfaced as fatal if it ever happens.
    #[error("planning failed irrecoverably: {0}")]
    PlanningError(String),

    /// No registered agent provides the requested capability/agent type.
    #[error("no agent registered for capability/agent type: {0}")]
    UnroutableTask(String),

    /// A correlation or session deadline expired.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A subscriber handler threw/returned an error.
    #[error("handler failure: {0}")]
    HandlerFailure(String),

    /// The operation was cancelled, either explicitly or by a session-wide
    /// cascade cancel.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A task plan failed DAG validation (duplicate id, dangling
    /// dependency, or cycle).
    #[error("invalid task plan: {0}")]
    InvalidPlan(String),

    /// An agent lifecycle transition was attempted from a state that does
    /// not allow it.
    #[error("invalid agent state transition: {agent_id} from {from:?} to {to:?}")]
    InvalidAgentTransition {
        agent_id: String,
        from: &'static str,
        to: &'static str,
    },

    /// An agent id was already registered.
    #[error("agent already registered: {0}")]
    AgentAlreadyRegistered(String),

    /// An agent id was not found in the context's registration table.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// Serialization/deserialization failure at a mesh boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type MeshResult<T> = Result<T, MeshError>;

/// Informational-only outcome: synthesis degraded to the deterministic
/// concatenator. Not an error — never propagated as `Err`, but threaded
/// through `OrchestratorNotice` so callers/tests can observe it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisFallback;

/// Structured error event published on `io.amcp.error`. Carries enough
/// context to correlate back to the session/correlation that failed,
/// without holding a reference to either — the tracker and session map
/// own no back-pointers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MeshErrorEvent {
    pub error_type: String,
    pub severity: ErrorSeverity,
    pub error_message: String,
    pub correlation_id: Option<CorrelationId>,
    pub session_id: Option<SessionId>,
    pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl MeshErrorEvent {
    pub fn from_mesh_error(
        err: &MeshError,
        correlation_id: Option<CorrelationId>,
        session_id: Option<SessionId>,
    ) -> Self {
        let severity = match err {
            MeshError::Timeout(_) | MeshError::Cancelled(_) => ErrorSeverity::Warning,
            MeshError::PlanningError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        };
        Self {
            error_type: error_type_name(err).to_string(),
            severity,
            error_message: err.to_string(),
            correlation_id,
            session_id,
            stack_trace: None,
        }
    }
}

fn error_type_name(err: &MeshError) -> &'static str {
    match err {
        MeshError::InvalidPattern(_) => "InvalidPattern",
        MeshError::InvalidTopic(_) => "InvalidTopic",
        MeshError::InvalidParameters(_) => "InvalidParameters",
        MeshError::PlanningError(_) => "PlanningError",
        MeshError::UnroutableTask(_) => "UnroutableTask",
        MeshError::Timeout(_) => "Timeout",
        MeshError::HandlerFailure(_) => "HandlerFailure",
        MeshError::Cancelled(_) => "Cancelled",
        MeshError::InvalidPlan(_) => "InvalidPlan",
        MeshError::InvalidAgentTransition { .. } => "InvalidAgentTransition",
        MeshError::AgentAlreadyRegistered(_) => "AgentAlreadyRegistered",
        MeshError::AgentNotFound(_) => "AgentNotFound",
        MeshError::Serialization(_) => "Serialization",
    }
}
