//! factlog
//!
//! An append-only event log with filter queries, optimistic conditional
//! appends and subscriptions.
//!
//! # Features
//!
//! - **Filter queries**: select by event type and by payload subset predicates
//! - **Optimistic append**: commit only if the queried context is unchanged
//! - **Two engines**: in-memory (fair read/write lock) and PostgreSQL
//! - **Fan-out**: committed batches are delivered to every subscriber
//!
//! # Modules
//!
//! - `types`: Events, records, filters and queries
//! - `filter`: Deep-subset payload matcher
//! - `lock`: FIFO-fair async read/write lock
//! - `notifier`: Subscription registry and fan-out
//! - `stores`: The `EventStore` facade and its engines
//! - `error`: Error types
//! - `utils`: Atomic file writes
//!
//! # Example
//!
//! ```no_run
//! use factlog::{Event, EventFilter, EventQuery, EventStore, MemoryEventStore};
//! use serde_json::json;
//!
//! # async fn run() -> factlog::StoreResult<()> {
//! let store = MemoryEventStore::new();
//! let account = EventQuery::from(
//!     EventFilter::new(["Deposited"])
//!         .with_payload_predicate(json!({"accountId": "a-1"}).as_object().cloned().unwrap_or_default()),
//! );
//!
//! let context = store.query(&account).await?;
//! store
//!     .append(
//!         vec![Event::from_json("Deposited", json!({"accountId": "a-1", "amount": 10}))?],
//!         Some(context.append_condition(account.clone())),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod filter;
pub mod lock;
pub mod notifier;
pub mod stores;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use error::{BackingStoreError, HandlerError, LockError, StoreError, StoreResult};
pub use filter::{matches_filter, matches_query};
pub use lock::{FairRwLock, LockKind, LockStatus};
pub use notifier::{event_handler, EventBatch, EventHandler, EventStreamNotifier, EventSubscription, MemoryNotifier};
pub use stores::memory::{MemoryEventStore, MemoryEventStoreConfig};
pub use stores::postgres::{PostgresEventStore, PostgresEventStoreConfig, SqlExecutor};
pub use stores::EventStore;
pub use types::{AppendCondition, Event, EventFilter, EventQuery, EventRecord, Payload, QueryResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
