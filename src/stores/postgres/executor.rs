//! Seam between the durable engine and a PostgreSQL client
//!
//! The engine only builds statements and decodes rows. Running them against a
//! connection pool (and any deadlines) belongs to the embedding application.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::BackingStoreError;

/// A bound statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// `text[]`
    TextArray(Vec<String>),
    /// `jsonb`, as JSON text
    Jsonb(String),
    /// `jsonb[]`, each element as JSON text
    JsonbArray(Vec<String>),
}

/// SQL text with positional parameters (`$1`, `$2`, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A statement without parameters
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

/// One row of the events table as returned by the client
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub sequence_number: i64,
    pub occurred_at: DateTime<Utc>,
    pub event_type: String,
    /// Either a decoded JSON object or the JSON text of one
    pub payload: Value,
}

/// Runs statements against the backing database
///
/// Implementations must run every statement as its own transaction at
/// `SERIALIZABLE` isolation (or an equivalent that makes the conditional
/// insert's read and write atomic). A serialization failure should be
/// reported with SQLSTATE `40001` in [`BackingStoreError::code`]; the engine
/// turns it into a conflict.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a statement that returns event rows
    async fn fetch_events(&self, statement: &SqlStatement) -> Result<Vec<EventRow>, BackingStoreError>;

    /// Run a statement that returns no rows; yields the affected row count
    async fn execute(&self, statement: &SqlStatement) -> Result<u64, BackingStoreError>;
}
