//! Query compiler
//!
//! Turns an [`EventQuery`] into PostgreSQL. Type membership becomes
//! `event_type = ANY($n)` and each payload predicate becomes a single
//! `payload @> $n` containment test. Containment is JSONB containment: for
//! arrays it only approximates the in-memory matcher's any-element rule.

use serde_json::Value;

use crate::types::{EventFilter, EventQuery};

use super::executor::{SqlParam, SqlStatement};

/// Columns read back for every record
pub const RECORD_COLUMNS: &str = "sequence_number, occurred_at, event_type, payload";

/// A compiled WHERE condition and the parameters it binds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    /// `None` when the query matches every event
    pub sql: Option<String>,
    pub params: Vec<SqlParam>,
}

impl Condition {
    fn where_clause(&self) -> String {
        self.sql
            .as_ref()
            .map(|sql| format!(" WHERE {sql}"))
            .unwrap_or_default()
    }
}

struct Binder {
    next: usize,
    params: Vec<SqlParam>,
}

impl Binder {
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        let placeholder = format!("${}", self.next);
        self.next += 1;
        placeholder
    }
}

fn compile_filter(filter: &EventFilter, binder: &mut Binder) -> String {
    let mut parts = Vec::with_capacity(2);

    if !filter.event_types.is_empty() {
        let types = filter.event_types.iter().cloned().collect();
        let placeholder = binder.bind(SqlParam::TextArray(types));
        parts.push(format!("event_type = ANY({placeholder})"));
    }

    if !filter.payload_predicates.is_empty() {
        let predicates: Vec<String> = filter
            .payload_predicates
            .iter()
            .map(|predicate| {
                let json = Value::Object(predicate.clone()).to_string();
                format!("payload @> {}", binder.bind(SqlParam::Jsonb(json)))
            })
            .collect();
        parts.push(format!("({})", predicates.join(" OR ")));
    }

    format!("({})", parts.join(" AND "))
}

/// Compile a query into a condition whose placeholders start at `$first_param`
pub fn compile_condition(query: &EventQuery, first_param: usize) -> Condition {
    if query.is_match_all() {
        return Condition::default();
    }

    let mut binder = Binder {
        next: first_param,
        params: Vec::new(),
    };
    let clauses: Vec<String> = query
        .filters
        .iter()
        .map(|filter| compile_filter(filter, &mut binder))
        .collect();

    Condition {
        sql: Some(clauses.join(" OR ")),
        params: binder.params,
    }
}

/// All records matching the query, ascending by sequence number
pub fn build_select(table: &str, query: &EventQuery) -> SqlStatement {
    let condition = compile_condition(query, 1);
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM {table}{} ORDER BY sequence_number ASC",
        condition.where_clause()
    );
    SqlStatement::new(sql, condition.params)
}

/// Insert a batch only if the query's high-water mark is still `expected`.
///
/// Gate and insert are a single statement. The event types and payloads are
/// bound as the two parameters after the condition's own.
pub fn build_conditional_insert(
    table: &str,
    query: &EventQuery,
    expected: u64,
    event_types: SqlParam,
    payloads: SqlParam,
) -> SqlStatement {
    let condition = compile_condition(query, 1);
    let types_slot = condition.params.len() + 1;
    let payloads_slot = types_slot + 1;

    let sql = format!(
        "WITH context AS (SELECT MAX(sequence_number) AS max_seq FROM {table}{where_clause}) \
         INSERT INTO {table} (event_type, payload) \
         SELECT unnest(${types_slot}::text[]), unnest(${payloads_slot}::jsonb[]) FROM context \
         WHERE COALESCE(max_seq, 0) = {expected} \
         RETURNING {RECORD_COLUMNS}",
        where_clause = condition.where_clause(),
    );

    let mut params = condition.params;
    params.push(event_types);
    params.push(payloads);
    SqlStatement::new(sql, params)
}
