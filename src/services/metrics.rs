//! Metrics & error events: counters and
//! latency observations the orchestrator and broker accumulate, exposed
//! as an immutable snapshot rather than a live handle so callers can log
//! or export it without holding a lock open.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

/// The four orchestration phases whose wall-clock latency is tracked
/// independently, so a slow planner can be told apart from a slow
/// synthesizer in the exported snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Plan,
    Dispatch,
    Collect,
    Synth,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::Dispatch => "dispatch",
            Phase::Collect => "collect",
            Phase::Synth => "synth",
        }
    }
}

/// Shared, cheaply-cloned counter/latency sink. Each orchestrator and
/// broker instance holds one; `snapshot()` is the only way to read it
/// back out.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    sessions_started: Arc<AtomicU64>,
    sessions_completed: Arc<AtomicU64>,
    sessions_failed: Arc<AtomicU64>,
    sessions_cancelled: Arc<AtomicU64>,
    tasks_dispatched: Arc<AtomicU64>,
    tasks_succeeded: Arc<AtomicU64>,
    tasks_failed: Arc<AtomicU64>,
    tasks_timed_out: Arc<AtomicU64>,
    synthesis_fallbacks: Arc<AtomicU64>,
    session_durations: Arc<RwLock<Vec<Duration>>>,
    phase_durations: Arc<RwLock<HashMap<&'static str, Vec<Duration>>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn session_completed(&self, duration: Duration) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
        self.session_durations.write().await.push(duration);
    }

    pub fn session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_cancelled(&self) {
        self.sessions_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_dispatched(&self) {
        self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_succeeded(&self) {
        self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_timed_out(&self) {
        self.tasks_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn synthesis_fallback(&self) {
        self.synthesis_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long a single phase took for one session.
    pub async fn observe_phase(&self, phase: Phase, duration: Duration) {
        self.phase_durations
            .write()
            .await
            .entry(phase.as_str())
            .or_default()
            .push(duration);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let durations = self.session_durations.read().await;
        let avg_session_duration_ms = if durations.is_empty() {
            0
        } else {
            (durations.iter().map(Duration::as_millis).sum::<u128>() / durations.len() as u128) as u64
        };

        let phases = self.phase_durations.read().await;
        let mut phase_stats = HashMap::with_capacity(phases.len());
        for (name, samples) in phases.iter() {
            phase_stats.insert((*name).to_string(), PhaseStats::from_samples(samples));
        }

        MetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            sessions_cancelled: self.sessions_cancelled.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_timed_out: self.tasks_timed_out.load(Ordering::Relaxed),
            synthesis_fallbacks: self.synthesis_fallbacks.load(Ordering::Relaxed),
            avg_session_duration_ms,
            phase_stats,
        }
    }
}

/// Count/sum/max latency rollup for one phase.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PhaseStats {
    pub count: u64,
    pub sum_ms: u64,
    pub max_ms: u64,
}

impl PhaseStats {
    fn from_samples(samples: &[Duration]) -> Self {
        let count = samples.len() as u64;
        let sum_ms = samples.iter().map(Duration::as_millis).sum::<u128>() as u64;
        let max_ms = samples.iter().map(Duration::as_millis).max().unwrap_or(0) as u64;
        Self { count, sum_ms, max_ms }
    }
}

/// Point-in-time read of [`MetricsRegistry`]'s counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub sessions_cancelled: u64,
    pub tasks_dispatched: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub tasks_timed_out: u64,
    pub synthesis_fallbacks: u64,
    pub avg_session_duration_ms: u64,
    pub phase_stats: HashMap<String, PhaseStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_accumulate_independently() {
        let metrics = MetricsRegistry::new();
        metrics.session_started();
        metrics.session_started();
        metrics.task_dispatched();
        metrics.task_succeeded();
        metrics.synthesis_fallback();

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.sessions_started, 2);
        assert_eq!(snapshot.tasks_dispatched, 1);
        assert_eq!(snapshot.tasks_succeeded, 1);
        assert_eq!(snapshot.synthesis_fallbacks, 1);
    }

    #[tokio::test]
    async fn average_session_duration_is_computed_over_completions() {
        let metrics = MetricsRegistry::new();
        metrics.session_completed(Duration::from_millis(100)).await;
        metrics.session_completed(Duration::from_millis(300)).await;
        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.avg_session_duration_ms, 200);
    }

    #[tokio::test]
    async fn phase_stats_roll_up_count_sum_and_max() {
        let metrics = MetricsRegistry::new();
        metrics.observe_phase(Phase::Plan, Duration::from_millis(10)).await;
        metrics.observe_phase(Phase::Plan, Duration::from_millis(30)).await;
        metrics.observe_phase(Phase::Dispatch, Duration::from_millis(100)).await;

        let snapshot = metrics.snapshot().await;
        let plan = snapshot.phase_stats.get("plan").unwrap();
        assert_eq!(plan.count, 2);
        assert_eq!(plan.sum_ms, 40);
        assert_eq!(plan.max_ms, 30);
        assert_eq!(snapshot.phase_stats.get("dispatch").unwrap().count, 1);
    }
}
