//! Domain layer: models, ports, and errors. No I/O, no async runtime
//! dependency beyond the trait signatures themselves.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{MeshError, MeshErrorEvent, MeshResult};
