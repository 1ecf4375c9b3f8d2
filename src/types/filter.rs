//! Filter and query value objects
//!
//! A filter selects events by type membership AND (any of) its payload
//! predicates. A query is a list of filters joined by OR. Both are immutable:
//! the fluent builders consume `self` and return a new value.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::event::{EventRecord, Payload};

/// Selects events by type and payload content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    /// Accepted event types; empty accepts every type
    #[serde(default)]
    pub event_types: BTreeSet<String>,

    /// Payload predicates; the payload must contain at least one of them.
    /// Empty accepts every payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload_predicates: Vec<Payload>,
}

impl EventFilter {
    /// Create a filter over the given event types
    pub fn new<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_types: event_types.into_iter().map(Into::into).collect(),
            payload_predicates: Vec::new(),
        }
    }

    /// A filter that matches every event
    pub fn all() -> Self {
        Self::default()
    }

    /// Return a new filter with one more payload predicate (OR-ed with the others)
    pub fn with_payload_predicate(mut self, predicate: Payload) -> Self {
        self.payload_predicates.push(predicate);
        self
    }

    /// Return a new filter with additional payload predicates
    pub fn with_payload_predicates<I>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = Payload>,
    {
        self.payload_predicates.extend(predicates);
        self
    }

    /// Whether this filter constrains nothing
    pub fn is_match_all(&self) -> bool {
        self.event_types.is_empty() && self.payload_predicates.is_empty()
    }
}

/// A list of filters joined by OR; empty matches every event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub filters: Vec<EventFilter>,
}

impl EventQuery {
    pub fn new(filters: Vec<EventFilter>) -> Self {
        Self { filters }
    }

    /// A query that matches every event
    pub fn all() -> Self {
        Self::default()
    }

    /// Return a new query with one more filter
    pub fn or(mut self, filter: EventFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Whether any filter (or the absence of filters) makes this query match everything
    pub fn is_match_all(&self) -> bool {
        self.filters.is_empty() || self.filters.iter().any(EventFilter::is_match_all)
    }
}

impl From<EventFilter> for EventQuery {
    fn from(filter: EventFilter) -> Self {
        Self {
            filters: vec![filter],
        }
    }
}

/// Matching records plus the optimistic-concurrency token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Matches in ascending sequence order
    pub events: Vec<EventRecord>,

    /// Sequence number of the last match, or 0 if nothing matched
    pub max_sequence_number: u64,
}

impl QueryResult {
    /// Build a result from matches that are already in ascending order
    pub fn from_matches(events: Vec<EventRecord>) -> Self {
        let max_sequence_number = events.last().map_or(0, |e| e.sequence_number);
        Self {
            events,
            max_sequence_number,
        }
    }

    /// The condition under which an append is consistent with this observation
    pub fn append_condition(&self, query: impl Into<EventQuery>) -> AppendCondition {
        AppendCondition::new(query, self.max_sequence_number)
    }
}

/// The context an optimistic append depends on
///
/// The append commits only if `query` still reports
/// `expected_max_sequence_number` at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendCondition {
    pub query: EventQuery,
    pub expected_max_sequence_number: u64,
}

impl AppendCondition {
    pub fn new(query: impl Into<EventQuery>, expected_max_sequence_number: u64) -> Self {
        Self {
            query: query.into(),
            expected_max_sequence_number,
        }
    }
}
