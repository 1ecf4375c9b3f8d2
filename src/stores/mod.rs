//! Event store engines
//!
//! Every engine exposes the same facade: `query`, `append` and `subscribe`.
//!
//! # Optimistic append
//!
//! ```text
//! ┌──────────┐  query(q)   ┌────────────────────┐
//! │  Caller  │────────────►│ events + max seq S │
//! └────┬─────┘             └────────────────────┘
//!      │ decide
//!      ▼
//! append(events, q, S) ──► re-derive max seq under q ──► == S ? commit : Conflict
//!                                                          │
//!                                                          ▼
//!                                                 notifier fan-out
//! ```
//!
//! - `memory`: records in a `Vec` behind a FIFO-fair read/write lock
//! - `postgres`: records in a table; the gate and the insert are one statement

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::notifier::{EventHandler, EventSubscription};
use crate::types::{AppendCondition, Event, EventQuery, EventRecord, QueryResult};

/// The store facade shared by all engines
#[async_trait]
pub trait EventStore: Send + Sync {
    /// All records matching `query` in ascending order, plus the high-water mark
    async fn query(&self, query: &EventQuery) -> StoreResult<QueryResult>;

    /// Append events.
    ///
    /// With a condition, the events are committed only if the condition's
    /// query still reports the expected high-water mark; otherwise the call
    /// fails with `StoreError::Conflict` and nothing is written. Without a
    /// condition the events are appended unconditionally.
    ///
    /// Returns the committed records, which are also handed to subscribers.
    async fn append(
        &self,
        events: Vec<Event>,
        condition: Option<AppendCondition>,
    ) -> StoreResult<Vec<EventRecord>>;

    /// Receive every batch committed from now on
    fn subscribe(&self, handler: EventHandler) -> EventSubscription;

    /// Drop all subscriptions
    fn close(&self);
}
