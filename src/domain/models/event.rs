//! Event & envelope domain model.
//!
//! An [`Event`] is an immutable record carrying a hierarchical topic, an
//! opaque JSON payload, and CloudEvents 1.0 metadata. Construction goes
//! through [`EventBuilder`] so every event the mesh ever sees holds the
//! same invariants: non-empty topic, a correlation id on every
//! `*.request` event, and a defaulted timestamp.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::errors::{MeshError, MeshResult};
use crate::domain::models::ids::{AgentId, CorrelationId, EventId};

/// CloudEvents 1.0 required metadata keys.
pub const CE_SPECVERSION: &str = "ce-specversion";
pub const CE_TYPE: &str = "ce-type";
pub const CE_SOURCE: &str = "ce-source";
pub const CE_DATACONTENTTYPE: &str = "ce-datacontenttype";

/// Delivery semantics requested for a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOptions {
    /// `true` = at-least-once (broker retries a failing handler with
    /// exponential backoff up to `max_retries` times). `false` =
    /// at-most-once, delivered once regardless of handler outcome.
    pub reliable: bool,
    /// Maximum retry attempts for a reliable delivery. Ignored when
    /// `reliable` is false.
    pub max_retries: u32,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            reliable: false,
            max_retries: 0,
        }
    }
}

impl DeliveryOptions {
    pub fn at_most_once() -> Self {
        Self::default()
    }

    pub fn reliable(max_retries: u32) -> Self {
        Self {
            reliable: true,
            max_retries,
        }
    }
}

/// Immutable event record. Equality and hashing are by `id`
/// only — two events with the same id are the same event even if clones
/// diverged in transit, which cannot happen since nothing mutates an
/// event after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub topic: String,
    pub payload: Value,
    pub correlation_id: Option<CorrelationId>,
    pub sender: Option<AgentId>,
    pub timestamp: DateTime<Utc>,
    pub delivery: DeliveryOptions,
    pub metadata: HashMap<String, String>,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Event {
    /// Start building an event for `topic`.
    pub fn builder(topic: impl Into<String>) -> EventBuilder {
        EventBuilder::new(topic)
    }

    /// Whether this event carries all four CloudEvents 1.0 attributes
    /// required by §4.1, and the source looks like a URN.
    pub fn is_cloud_events_compliant(&self) -> bool {
        let has_all_keys = [CE_SPECVERSION, CE_TYPE, CE_SOURCE, CE_DATACONTENTTYPE]
            .iter()
            .all(|k| self.metadata.contains_key(*k));
        if !has_all_keys {
            return false;
        }
        self.metadata.get(CE_SPECVERSION).map(String::as_str) == Some("1.0")
            && self.metadata.get(CE_SOURCE).is_some_and(|source| is_urn(source))
    }

    /// `true` if the topic's final dotted segment is `request`, per the
    /// `*.request` convention the builder uses to auto-generate a
    /// correlation id.
    fn is_request_topic(topic: &str) -> bool {
        topic.rsplit('.').next() == Some("request")
    }
}

/// Whether `source` has the `urn:<NID>:<NSS>` shape of RFC 8141: the
/// `urn:` prefix followed by a non-empty namespace identifier and a
/// non-empty namespace-specific string.
fn is_urn(source: &str) -> bool {
    let Some(rest) = source.strip_prefix("urn:") else {
        return false;
    };
    let mut parts = rest.splitn(2, ':');
    let nid = parts.next().unwrap_or("");
    let nss = parts.next().unwrap_or("");
    !nid.is_empty() && !nss.is_empty()
}

/// Builder for [`Event`]. See 
#[derive(Debug, Clone)]
pub struct EventBuilder {
    topic: String,
    payload: Value,
    correlation_id: Option<CorrelationId>,
    sender: Option<AgentId>,
    timestamp: Option<DateTime<Utc>>,
    delivery: DeliveryOptions,
    metadata: HashMap<String, String>,
}

impl EventBuilder {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: Value::Null,
            correlation_id: None,
            sender: None,
            timestamp: None,
            delivery: DeliveryOptions::default(),
            metadata: HashMap::new(),
        }
    }

    pub fn payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn sender(mut self, sender: AgentId) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    pub fn delivery(mut self, delivery: DeliveryOptions) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stamp the four required CloudEvents attributes in one call.
    pub fn cloud_events(self, ce_type: impl Into<String>, ce_source: impl Into<String>) -> Self {
        self.metadata(CE_SPECVERSION, "1.0")
            .metadata(CE_TYPE, ce_type)
            .metadata(CE_SOURCE, ce_source)
            .metadata(CE_DATACONTENTTYPE, "application/json")
    }

    /// Validate and construct the [`Event`].
    ///
    /// Fails with [`MeshError::InvalidTopic`] on an empty topic. If the
    /// event has no correlation id and the topic is a `*.request` topic,
    /// a fresh [`CorrelationId`] is generated.
    pub fn build(mut self) -> MeshResult<Event> {
        if self.topic.trim().is_empty() {
            return Err(MeshError::InvalidTopic("topic must not be empty".into()));
        }
        if self.correlation_id.is_none() && Event::is_request_topic(&self.topic) {
            self.correlation_id = Some(CorrelationId::new());
        }
        Ok(Event {
            id: EventId::new(),
            topic: self.topic,
            payload: self.payload,
            correlation_id: self.correlation_id,
            sender: self.sender,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            delivery: self.delivery,
            metadata: self.metadata,
        })
    }
}
