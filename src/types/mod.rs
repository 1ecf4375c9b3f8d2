//! Data types for the event store
//!
//! This module contains the value objects shared by every engine: events,
//! committed records, filters, queries and append conditions.

mod event;
mod filter;

pub use event::{Event, EventRecord, Payload};
pub use filter::{AppendCondition, EventFilter, EventQuery, QueryResult};
