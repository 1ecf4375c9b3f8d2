//! In-process notifier
//!
//! Every registered handler receives each committed batch. Handlers run
//! concurrently, each in its own tokio task, so an error or a panic in one of
//! them is logged and does not affect the others or the appender.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::types::EventRecord;

use super::{EventBatch, EventHandler, EventStreamNotifier};

struct Subscription {
    id: String,
    handler: EventHandler,
}

/// Registered handlers, keyed by registration order
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    next_id: AtomicU64,
    subscriptions: Mutex<BTreeMap<u64, Subscription>>,
}

impl SubscriptionRegistry {
    fn register(&self, handler: EventHandler) -> (u64, String) {
        // Ids keep increasing across close() so a stale handle can never
        // remove a newer registration
        let key = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("notifier-sub-{key}");
        self.subscriptions.lock().insert(
            key,
            Subscription {
                id: id.clone(),
                handler,
            },
        );
        (key, id)
    }

    fn remove(&self, key: u64) -> bool {
        self.subscriptions.lock().remove(&key).is_some()
    }

    fn snapshot(&self) -> Vec<(String, EventHandler)> {
        self.subscriptions
            .lock()
            .values()
            .map(|s| (s.id.clone(), Arc::clone(&s.handler)))
            .collect()
    }

    fn clear(&self) {
        self.subscriptions.lock().clear();
    }

    fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

/// Handle returned by `subscribe`
///
/// Dropping the handle does not unsubscribe; call [`unsubscribe`](Self::unsubscribe).
#[derive(Clone)]
pub struct EventSubscription {
    id: String,
    key: u64,
    registry: Weak<SubscriptionRegistry>,
}

impl EventSubscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remove the registration. Calling this again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.key) {
                debug!(subscription_id = %self.id, "unsubscribed");
            }
        }
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription").field("id", &self.id).finish()
    }
}

/// Default notifier: fans batches out to in-process handlers
#[derive(Default)]
pub struct MemoryNotifier {
    registry: Arc<SubscriptionRegistry>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live registrations
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }
}

#[async_trait]
impl EventStreamNotifier for MemoryNotifier {
    fn subscribe(&self, handler: EventHandler) -> EventSubscription {
        let (key, id) = self.registry.register(handler);
        debug!(subscription_id = %id, "subscribed");
        EventSubscription {
            id,
            key,
            registry: Arc::downgrade(&self.registry),
        }
    }

    async fn notify(&self, records: Vec<EventRecord>) {
        if records.is_empty() {
            return;
        }

        let batch: EventBatch = records.into();
        let subscriptions = self.registry.snapshot();
        debug!(
            records = batch.len(),
            subscribers = subscriptions.len(),
            "notifying subscribers"
        );

        let deliveries = subscriptions.into_iter().map(|(id, handler)| {
            let batch = Arc::clone(&batch);
            let task = tokio::spawn(async move { handler(batch).await });
            async move { (id, task.await) }
        });

        for (id, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(subscription_id = %id, error = %e, "error notifying subscription");
                }
                Err(e) => {
                    error!(subscription_id = %id, error = %e, "subscription handler panicked");
                }
            }
        }
    }

    fn close(&self) {
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::notifier::event_handler;
    use crate::types::Event;
    use chrono::Utc;

    fn record(sequence_number: u64) -> EventRecord {
        EventRecord::commit(Event::empty("t1"), sequence_number, Utc::now())
    }

    fn recording_handler(seen: Arc<Mutex<Vec<u64>>>) -> EventHandler {
        event_handler(move |batch: EventBatch| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().extend(batch.iter().map(|r| r.sequence_number));
                Ok::<(), HandlerError>(())
            }
        })
    }

    #[tokio::test]
    async fn test_subscription_ids_increase() {
        let notifier = MemoryNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = notifier.subscribe(recording_handler(Arc::clone(&seen)));
        let b = notifier.subscribe(recording_handler(Arc::clone(&seen)));
        assert_eq!(a.id(), "notifier-sub-1");
        assert_eq!(b.id(), "notifier-sub-2");
        assert_eq!(notifier.subscription_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_subscriber_is_isolated() {
        let notifier = MemoryNotifier::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let third = Arc::new(Mutex::new(Vec::new()));

        notifier.subscribe(recording_handler(Arc::clone(&first)));
        notifier.subscribe(event_handler(|_batch: EventBatch| async move {
            Err::<(), HandlerError>(HandlerError::from("projection table missing"))
        }));
        notifier.subscribe(recording_handler(Arc::clone(&third)));

        notifier.notify(vec![record(1)]).await;

        assert_eq!(*first.lock(), vec![1]);
        assert_eq!(*third.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let notifier = MemoryNotifier::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let third = Arc::new(Mutex::new(Vec::new()));

        notifier.subscribe(recording_handler(Arc::clone(&first)));
        notifier.subscribe(event_handler(|batch: EventBatch| async move {
            if !batch.is_empty() {
                panic!("subscriber bug");
            }
            Ok::<(), HandlerError>(())
        }));
        notifier.subscribe(recording_handler(Arc::clone(&third)));

        notifier.notify(vec![record(1), record(2)]).await;

        assert_eq!(*first.lock(), vec![1, 2]);
        assert_eq!(*third.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_delivered() {
        let notifier = MemoryNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&calls);
        notifier.subscribe(event_handler(move |_batch: EventBatch| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), HandlerError>(()) }
        }));
        notifier.subscribe(recording_handler(Arc::clone(&seen)));

        notifier.notify(Vec::new()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let notifier = MemoryNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let subscription = notifier.subscribe(recording_handler(Arc::clone(&seen)));
        subscription.unsubscribe();
        subscription.unsubscribe();
        assert_eq!(notifier.subscription_count(), 0);

        notifier.notify(vec![record(1)]).await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_after_close() {
        let notifier = MemoryNotifier::new();
        let before = Arc::new(Mutex::new(Vec::new()));
        let after = Arc::new(Mutex::new(Vec::new()));

        let stale = notifier.subscribe(recording_handler(Arc::clone(&before)));
        notifier.close();
        notifier.close();
        assert_eq!(notifier.subscription_count(), 0);

        let fresh = notifier.subscribe(recording_handler(Arc::clone(&after)));
        assert_ne!(stale.id(), fresh.id());
        // A handle from before close() cannot remove the new registration
        stale.unsubscribe();

        notifier.notify(vec![record(3)]).await;
        assert!(before.lock().is_empty());
        assert_eq!(*after.lock(), vec![3]);
    }
}
