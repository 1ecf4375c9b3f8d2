//! Durable engine over PostgreSQL
//!
//! The engine compiles queries and conditional inserts to SQL and hands them
//! to a [`SqlExecutor`] supplied by the application.
//!
//! Payload predicates are evaluated with JSONB containment (`@>`). For
//! objects and scalar leaves this agrees with the in-memory matcher; for
//! arrays JSONB containment is its own rule, and results are not re-filtered
//! in process so that a query's `max_sequence_number` always agrees with the
//! gate the insert statement evaluates.

mod executor;
mod schema;
mod sql;
mod store;
mod transform;

pub use executor::{EventRow, SqlExecutor, SqlParam, SqlStatement};
pub use schema::{schema_statements, validate_table_name};
pub use sql::{build_conditional_insert, build_select, compile_condition, Condition};
pub use store::{PostgresEventStore, PostgresEventStoreConfig};
pub use transform::{insert_params, row_to_record, rows_to_records};
