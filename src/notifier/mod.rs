//! Subscription and fan-out of committed events
//!
//! Stores hand every committed batch to an [`EventStreamNotifier`], which
//! delivers it to the registered handlers.

mod memory;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::HandlerError;
use crate::types::EventRecord;

pub use memory::{EventSubscription, MemoryNotifier};

/// A committed batch, shared between all handlers
pub type EventBatch = Arc<[EventRecord]>;

/// A subscriber callback
pub type EventHandler =
    Arc<dyn Fn(EventBatch) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Wrap an async closure as an [`EventHandler`]
pub fn event_handler<F, Fut>(handler: F) -> EventHandler
where
    F: Fn(EventBatch) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |batch: EventBatch| -> BoxFuture<'static, Result<(), HandlerError>> {
        Box::pin(handler(batch))
    })
}

/// Subscription registry plus fan-out delivery
#[async_trait]
pub trait EventStreamNotifier: Send + Sync {
    /// Register a handler for every future batch
    fn subscribe(&self, handler: EventHandler) -> EventSubscription;

    /// Deliver a batch to all current handlers and wait until each has settled.
    /// Empty batches are not delivered.
    async fn notify(&self, records: Vec<EventRecord>);

    /// Drop all registrations. Subscribing afterwards works normally.
    fn close(&self);
}
