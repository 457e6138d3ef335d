//! Newtype identifiers used throughout the mesh and orchestrator.
//!
//! Each id is a `Uuid` wrapper with `Display`, `Default`, and serde
//! support rather than a bare `Uuid` passed around positionally.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(EventId);
uuid_id!(CorrelationId);
uuid_id!(SessionId);
uuid_id!(PlanId);
uuid_id!(TaskId);

/// Stable, caller-assigned agent identifier. Unlike the other ids this is
/// not a generated `Uuid` — agents name themselves (`"weather-agent"`,
/// `"orchestrator-1"`) and that name is the subscriber id used by the
/// broker, so it has to be a plain string, not a fresh uuid per instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_unique_and_displayable() {
        let a = EventId::new();
        let b = EventId::new();
        assert_ne!(a, b);
        assert!(!a.to_string().is_empty());
    }

    #[test]
    fn agent_id_equality_is_by_name() {
        let a = AgentId::new("weather-agent");
        let b = AgentId::from("weather-agent");
        assert_eq!(a, b);
    }
}
