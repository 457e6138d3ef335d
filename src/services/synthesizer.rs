//! Synthesizer: reduces a set of
//! completed task results into the single natural-language answer the
//! orchestrator returns for a session. Prefers an LLM-backed tool and
//! degrades to a deterministic concatenation when one isn't available or
//! fails, mirroring the planning engine's primary/fallback shape.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::errors::MeshResult;
use crate::domain::models::{TaskOutcome, TaskResult};

/// Implemented by anything that can turn task results into prose. An
/// LLM-backed implementation lives in `adapters`; tests use the
/// deterministic [`ConcatenatingSynthesizer`] directly.
#[async_trait]
pub trait SynthesisTool: Send + Sync {
    fn name(&self) -> &'static str;

    async fn is_available(&self) -> bool {
        true
    }

    async fn synthesize(&self, goal: &str, results: &[TaskResult]) -> MeshResult<String>;
}

/// Deterministic, total synthesis used as the spec's guaranteed fallback
/// and directly in tests: joins every successful result's value and
/// lists failures by reason, with no external dependency.
pub struct ConcatenatingSynthesizer;

#[async_trait]
impl SynthesisTool for ConcatenatingSynthesizer {
    fn name(&self) -> &'static str {
        "concatenating-synthesizer"
    }

    async fn synthesize(&self, goal: &str, results: &[TaskResult]) -> MeshResult<String> {
        let mut lines = vec![format!("Results for: {goal}")];
        for result in results {
            match &result.outcome {
                TaskOutcome::Success { value } => {
                    lines.push(format!("- {}: {value}", result.task_id));
                }
                TaskOutcome::Failure { reason } => {
                    lines.push(format!("- {}: failed ({reason})", result.task_id));
                }
                TaskOutcome::TimedOut => {
                    lines.push(format!("- {}: timed out", result.task_id));
                }
                TaskOutcome::Cancelled => {
                    lines.push(format!("- {}: cancelled", result.task_id));
                }
            }
        }
        Ok(lines.join("\n"))
    }
}

/// Drives synthesis with an optional preferred tool and a mandatory total
/// fallback, returning whether the fallback was used so callers can
/// surface a [`SynthesisFallback`](crate::domain::errors::SynthesisFallback)
/// notice.
pub struct Synthesizer {
    preferred: Option<Arc<dyn SynthesisTool>>,
    fallback: Arc<dyn SynthesisTool>,
}

impl Synthesizer {
    pub fn new(preferred: Option<Arc<dyn SynthesisTool>>) -> Self {
        Self {
            preferred,
            fallback: Arc::new(ConcatenatingSynthesizer),
        }
    }

    pub async fn synthesize(&self, goal: &str, results: &[TaskResult]) -> (String, bool) {
        if let Some(tool) = &self.preferred {
            if tool.is_available().await {
                match tool.synthesize(goal, results).await {
                    Ok(text) => return (text, false),
                    Err(err) => warn!(tool = tool.name(), %err, "synthesis tool failed, falling back"),
                }
            }
        }
        let text = self
            .fallback
            .synthesize(goal, results)
            .await
            .expect("concatenating synthesizer is total");
        (text, true)
    }
}
