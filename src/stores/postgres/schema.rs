//! Table and index DDL
//!
//! Every statement is `IF NOT EXISTS`, so bootstrapping can run on each start.

use crate::error::{StoreError, StoreResult};

use super::executor::SqlStatement;

/// PostgreSQL's identifier length limit (NAMEDATALEN - 1)
const MAX_IDENTIFIER_LEN: usize = 63;

/// Accept only plain unquoted identifiers; the name is spliced into SQL text
pub fn validate_table_name(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest {
        return Err(StoreError::config(format!(
            "invalid table name {name:?}: expected [A-Za-z_][A-Za-z0-9_]*"
        )));
    }
    // The longest derived index name must fit as well
    if name.len() + "idx__payload_gin".len() > MAX_IDENTIFIER_LEN {
        return Err(StoreError::config(format!(
            "table name {name:?} is too long for its index names"
        )));
    }
    Ok(())
}

/// Statements creating the log table and its indexes
pub fn schema_statements(table: &str) -> Vec<SqlStatement> {
    vec![
        SqlStatement::raw(format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             sequence_number BIGSERIAL PRIMARY KEY, \
             occurred_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
             event_type TEXT NOT NULL, \
             payload JSONB NOT NULL, \
             metadata JSONB NOT NULL DEFAULT '{{}}')"
        )),
        SqlStatement::raw(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_type ON {table}(event_type)"
        )),
        SqlStatement::raw(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_occurred_at ON {table}(occurred_at)"
        )),
        SqlStatement::raw(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_payload_gin ON {table} USING gin(payload)"
        )),
    ]
}
