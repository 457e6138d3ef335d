//! AMCP — an in-process multi-agent event mesh and orchestration engine.
//!
//! The crate is layered domain/services/adapters/infrastructure:
//! - `domain` holds the event, subscription, agent, task, plan, and
//!   session models plus the ports (`Agent`, `PlannerTool`) other layers
//!   implement.
//! - `services` holds the stateful machinery: the topic matcher, event
//!   broker, agent context/registry, correlation tracker, planning
//!   engine, orchestrator, synthesizer, and metrics registry.
//! - `adapters` holds concrete `PlannerTool`/`SynthesisTool`
//!   implementations and the scripted demo agents used by the CLI and
//!   integration tests.
//! - `infrastructure` holds configuration loading and logging setup.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod mesh;
pub mod services;

pub use domain::errors::{MeshError, MeshErrorEvent, MeshResult};
pub use mesh::Mesh;
