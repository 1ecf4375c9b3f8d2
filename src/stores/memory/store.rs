//! In-memory event store
//!
//! Queries take a shared grant on the fair lock; appends take the exclusive
//! grant, re-check the caller's high-water mark and commit within that same
//! grant. Subscribers are notified after the grant is released, so two
//! concurrent appends may reach subscribers in either order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::lock::{FairRwLock, LockStatus};
use crate::notifier::{EventHandler, EventStreamNotifier, EventSubscription, MemoryNotifier};
use crate::stores::EventStore;
use crate::types::{AppendCondition, Event, EventQuery, EventRecord, QueryResult};

use super::stream::EventStream;

/// Configuration for the MemoryEventStore
#[derive(Debug, Clone)]
pub struct MemoryEventStoreConfig {
    /// Logs with at least this many records are scanned in parallel
    pub parallel_scan_threshold: usize,
}

impl Default for MemoryEventStoreConfig {
    fn default() -> Self {
        Self {
            parallel_scan_threshold: 10_000,
        }
    }
}

impl MemoryEventStoreConfig {
    pub fn with_parallel_scan_threshold(mut self, threshold: usize) -> Self {
        self.parallel_scan_threshold = threshold;
        self
    }
}

/// Event store backed by an in-process record buffer
pub struct MemoryEventStore {
    config: MemoryEventStoreConfig,
    pub(super) stream: FairRwLock<EventStream>,
    notifier: Arc<dyn EventStreamNotifier>,
}

impl MemoryEventStore {
    /// Create an empty store with default config
    pub fn new() -> Self {
        Self::with_config(MemoryEventStoreConfig::default())
    }

    /// Create an empty store with custom config
    pub fn with_config(config: MemoryEventStoreConfig) -> Self {
        Self::from_stream(EventStream::new(), config)
    }

    pub(crate) fn from_stream(stream: EventStream, config: MemoryEventStoreConfig) -> Self {
        Self {
            config,
            stream: FairRwLock::new(stream),
            notifier: Arc::new(MemoryNotifier::new()),
        }
    }

    /// Replace the default in-process notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn EventStreamNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &MemoryEventStoreConfig {
        &self.config
    }

    /// Current state of the store's lock
    pub fn lock_status(&self) -> LockStatus {
        self.stream.status()
    }

    /// Number of committed records
    pub async fn len(&self) -> usize {
        self.stream.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    #[instrument(skip_all, fields(filters = query.filters.len()))]
    async fn query(&self, query: &EventQuery) -> StoreResult<QueryResult> {
        let matches = {
            let stream = self.stream.read().await;
            stream.scan(query, self.config.parallel_scan_threshold)
        };

        let result = QueryResult::from_matches(matches);
        debug!(
            matches = result.events.len(),
            max_sequence_number = result.max_sequence_number,
            "query"
        );
        Ok(result)
    }

    #[instrument(skip_all, fields(events = events.len(), conditional = condition.is_some()))]
    async fn append(
        &self,
        events: Vec<Event>,
        condition: Option<AppendCondition>,
    ) -> StoreResult<Vec<EventRecord>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let records = {
            let mut stream = self.stream.write().await;

            if let Some(condition) = &condition {
                // Same grant as the commit below: no writer can slip in between
                let current = stream.max_sequence_number(&condition.query);
                if current != condition.expected_max_sequence_number {
                    warn!(
                        expected = condition.expected_max_sequence_number,
                        actual = current,
                        "append rejected: context changed"
                    );
                    return Err(StoreError::conflict(
                        condition.expected_max_sequence_number,
                        Some(current),
                    ));
                }
            }

            stream.append(events, Utc::now())
        };

        debug!(
            first = records.first().map(|r| r.sequence_number),
            last = records.last().map(|r| r.sequence_number),
            "appended"
        );

        self.notifier.notify(records.clone()).await;
        Ok(records)
    }

    fn subscribe(&self, handler: EventHandler) -> EventSubscription {
        self.notifier.subscribe(handler)
    }

    fn close(&self) {
        self.notifier.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventFilter;
    use serde_json::json;

    fn types(result: &QueryResult) -> Vec<(u64, String)> {
        result
            .events
            .iter()
            .map(|r| (r.sequence_number, r.event_type.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_append_then_query_by_type() {
        let store = MemoryEventStore::new();
        store
            .append(vec![Event::empty("t1"), Event::empty("t2")], None)
            .await
            .unwrap();

        let t2 = EventQuery::from(EventFilter::new(["t2"]));
        let result = store.query(&t2).await.unwrap();
        assert_eq!(types(&result), vec![(2, "t2".to_string())]);
        assert_eq!(result.max_sequence_number, 2);

        store
            .append(vec![Event::empty("t3"), Event::empty("t2")], None)
            .await
            .unwrap();
        let result = store.query(&t2).await.unwrap();
        assert_eq!(
            result.events.iter().map(|r| r.sequence_number).collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert_eq!(result.max_sequence_number, 4);
    }

    #[tokio::test]
    async fn test_stale_expectation_conflicts_without_writing() {
        let store = MemoryEventStore::new();
        let t1 = EventQuery::from(EventFilter::new(["t1"]));
        store.append(vec![Event::empty("t1")], None).await.unwrap();

        let observed = store.query(&t1).await.unwrap();
        store.append(vec![Event::empty("t1")], None).await.unwrap();

        let err = store
            .append(
                vec![Event::empty("t1")],
                Some(observed.append_condition(t1.clone())),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: 1,
                actual: Some(2)
            }
        ));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_unrelated_append_does_not_conflict() {
        let store = MemoryEventStore::new();
        let account = EventQuery::from(
            EventFilter::new(["Deposited"]).with_payload_predicate(
                json!({"accountId": "a-1"}).as_object().cloned().unwrap(),
            ),
        );

        let observed = store.query(&account).await.unwrap();
        assert_eq!(observed.max_sequence_number, 0);

        // Another account moves on; our context is untouched
        store
            .append(
                vec![Event::from_json("Deposited", json!({"accountId": "a-2", "amount": 5})).unwrap()],
                None,
            )
            .await
            .unwrap();

        let records = store
            .append(
                vec![Event::from_json("Deposited", json!({"accountId": "a-1", "amount": 10})).unwrap()],
                Some(observed.append_condition(account.clone())),
            )
            .await
            .unwrap();
        assert_eq!(records[0].sequence_number, 2);
    }

    #[tokio::test]
    async fn test_zero_expectation_is_checked() {
        let store = MemoryEventStore::new();
        let t1 = EventQuery::from(EventFilter::new(["t1"]));
        store.append(vec![Event::empty("t1")], None).await.unwrap();

        let err = store
            .append(vec![Event::empty("t1")], Some(AppendCondition::new(t1, 0)))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_empty_append_is_a_no_op() {
        let store = MemoryEventStore::new();
        let records = store
            .append(Vec::new(), Some(AppendCondition::new(EventQuery::all(), 42)))
            .await
            .unwrap();
        assert!(records.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_lock_is_released_after_conflict() {
        let store = MemoryEventStore::new();
        store.append(vec![Event::empty("t1")], None).await.unwrap();
        let err = store
            .append(vec![Event::empty("t1")], Some(AppendCondition::new(EventQuery::all(), 0)))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let status = store.lock_status();
        assert_eq!(status.read_count, 0);
        assert_eq!(status.write_count, 0);
        assert_eq!(status.queue_len(), 0);
    }
}
