//! Shared test utilities for end-to-end scenario tests.

use std::time::Duration;

use amcp::infrastructure::config::MeshConfig;
use amcp::mesh::{Mesh, MeshBuilder};

#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Build a [`Mesh`] with a short task timeout so timeout-path scenarios
/// don't make the suite slow.
pub fn short_timeout_mesh() -> Mesh {
    let mut config = MeshConfig::default();
    config.task_timeout_ms = 200;
    MeshBuilder::new(config).build()
}

pub fn default_mesh() -> Mesh {
    MeshBuilder::new(MeshConfig::default()).build()
}

#[allow(dead_code)]
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
