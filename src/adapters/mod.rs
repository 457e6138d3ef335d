//! Adapters: concrete implementations of domain ports, plus demo/test
//! fixtures that plug into the services layer without touching it.

pub mod demo_agents;
pub mod planner;
