//! Event types for the append-only log
//!
//! An `Event` is created by a caller and has no position yet. The log engine
//! turns it into an `EventRecord` at commit time by assigning a sequence
//! number and a timestamp. Neither is mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Event payload: a JSON object
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// An immutable fact that has not been appended yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Type of event, used for type filters
    pub event_type: String,

    /// Event-specific payload, used for payload predicates
    #[serde(default)]
    pub payload: Payload,
}

impl Event {
    /// Create a new event
    pub fn new(event_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Create an event from a JSON value, which must be an object
    pub fn from_json(event_type: impl Into<String>, payload: serde_json::Value) -> StoreResult<Self> {
        let event_type = event_type.into();
        match payload {
            serde_json::Value::Object(map) => Ok(Self::new(event_type, map)),
            other => Err(StoreError::invalid_record(format!(
                "payload of {event_type} event is not an object: {other}"
            ))),
        }
    }

    /// Create an event with an empty payload
    pub fn empty(event_type: impl Into<String>) -> Self {
        Self::new(event_type, Payload::new())
    }
}

/// A committed event with its position in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Position in the log, starting at 1
    pub sequence_number: u64,

    /// Commit time
    pub timestamp: DateTime<Utc>,

    pub event_type: String,

    #[serde(default)]
    pub payload: Payload,
}

impl EventRecord {
    /// Commit an event at the given position
    pub fn commit(event: Event, sequence_number: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            sequence_number,
            timestamp,
            event_type: event.event_type,
            payload: event.payload,
        }
    }

    /// The uncommitted event this record was created from
    pub fn to_event(&self) -> Event {
        Event::new(self.event_type.clone(), self.payload.clone())
    }
}
