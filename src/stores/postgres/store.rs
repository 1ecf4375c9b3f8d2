//! PostgreSQL-backed event store
//!
//! Sequence numbers and timestamps come from the table (`BIGSERIAL`,
//! `DEFAULT NOW()`). Appends are one conditional-insert statement, so a
//! failed gate writes nothing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::error::{StoreError, StoreResult};
use crate::notifier::{EventHandler, EventStreamNotifier, EventSubscription, MemoryNotifier};
use crate::stores::EventStore;
use crate::types::{AppendCondition, Event, EventFilter, EventQuery, EventRecord, QueryResult};

use super::executor::SqlExecutor;
use super::schema::{schema_statements, validate_table_name};
use super::sql::{build_conditional_insert, build_select};
use super::transform::{insert_params, rows_to_records};

/// SQLSTATE for `serialization_failure`
const SERIALIZATION_FAILURE: &str = "40001";

/// Configuration for the PostgresEventStore
#[derive(Debug, Clone)]
pub struct PostgresEventStoreConfig {
    /// Log table name, a plain SQL identifier
    pub table: String,

    /// Create the table and indexes when the store is opened
    pub ensure_schema: bool,
}

impl Default for PostgresEventStoreConfig {
    fn default() -> Self {
        Self {
            table: "events".to_string(),
            ensure_schema: false,
        }
    }
}

impl PostgresEventStoreConfig {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_ensure_schema(mut self, ensure_schema: bool) -> Self {
        self.ensure_schema = ensure_schema;
        self
    }
}

/// Event store over a PostgreSQL table
pub struct PostgresEventStore {
    config: PostgresEventStoreConfig,
    executor: Arc<dyn SqlExecutor>,
    notifier: Arc<dyn EventStreamNotifier>,
    /// Context type for unconditional appends; no stored event has it
    never_matching_type: String,
}

impl PostgresEventStore {
    /// Create a store, bootstrapping the schema if the config asks for it
    pub async fn open(
        executor: Arc<dyn SqlExecutor>,
        config: PostgresEventStoreConfig,
    ) -> StoreResult<Self> {
        validate_table_name(&config.table)?;

        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let store = Self {
            config,
            executor,
            notifier: Arc::new(MemoryNotifier::new()),
            never_matching_type: format!("__non_existent__{nanos:x}"),
        };

        if store.config.ensure_schema {
            store.ensure_schema().await?;
        }
        Ok(store)
    }

    /// Replace the default in-process notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn EventStreamNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &PostgresEventStoreConfig {
        &self.config
    }

    /// Create the log table and its indexes if absent
    #[instrument(skip_all, fields(table = %self.config.table))]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in schema_statements(&self.config.table) {
            self.executor.execute(&statement).await?;
        }
        info!("event table ready");
        Ok(())
    }

    /// The condition an unconditional append is checked against: a type no
    /// event carries, expected at 0, which always holds
    fn unconditional(&self) -> AppendCondition {
        AppendCondition::new(EventFilter::new([self.never_matching_type.clone()]), 0)
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[instrument(skip_all, fields(table = %self.config.table, filters = query.filters.len()))]
    async fn query(&self, query: &EventQuery) -> StoreResult<QueryResult> {
        let statement = build_select(&self.config.table, query);
        let rows = self.executor.fetch_events(&statement).await?;
        let result = QueryResult::from_matches(rows_to_records(rows)?);

        debug!(
            matches = result.events.len(),
            max_sequence_number = result.max_sequence_number,
            "query"
        );
        Ok(result)
    }

    #[instrument(skip_all, fields(table = %self.config.table, events = events.len(), conditional = condition.is_some()))]
    async fn append(
        &self,
        events: Vec<Event>,
        condition: Option<AppendCondition>,
    ) -> StoreResult<Vec<EventRecord>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let condition = condition.unwrap_or_else(|| self.unconditional());
        let expected = condition.expected_max_sequence_number;
        let (event_types, payloads) = insert_params(&events);
        let statement = build_conditional_insert(
            &self.config.table,
            &condition.query,
            expected,
            event_types,
            payloads,
        );

        let rows = match self.executor.fetch_events(&statement).await {
            Ok(rows) => rows,
            Err(e) if e.code.as_deref() == Some(SERIALIZATION_FAILURE) => {
                warn!(expected, error = %e, "append rejected: serialization failure");
                return Err(StoreError::conflict(expected, None));
            }
            Err(e) => return Err(e.into()),
        };

        if rows.is_empty() {
            warn!(expected, "append rejected: context changed");
            return Err(StoreError::conflict(expected, None));
        }

        let records = rows_to_records(rows)?;
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
