//! Conversions between events and table rows

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::types::{Event, EventRecord, Payload};

use super::executor::{EventRow, SqlParam};

/// Bulk parameters for the insert: `(text[] of types, jsonb[] of payloads)`
pub fn insert_params(events: &[Event]) -> (SqlParam, SqlParam) {
    let (types, payloads): (Vec<String>, Vec<String>) = events
        .iter()
        .map(|event| {
            (
                event.event_type.clone(),
                Value::Object(event.payload.clone()).to_string(),
            )
        })
        .unzip();
    (SqlParam::TextArray(types), SqlParam::JsonbArray(payloads))
}

fn decode_payload(sequence_number: u64, payload: Value) -> StoreResult<Payload> {
    let payload = match payload {
        Value::String(text) => serde_json::from_str(&text)?,
        other => other,
    };
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::invalid_record(format!(
            "payload of record {sequence_number} is not an object: {other}"
        ))),
    }
}

/// Decode one row
pub fn row_to_record(row: EventRow) -> StoreResult<EventRecord> {
    let sequence_number = u64::try_from(row.sequence_number).map_err(|_| {
        StoreError::invalid_record(format!("negative sequence number {}", row.sequence_number))
    })?;

    Ok(EventRecord {
        sequence_number,
        timestamp: row.occurred_at,
        event_type: row.event_type,
        payload: decode_payload(sequence_number, row.payload)?,
    })
}

/// Decode rows into records in ascending sequence order
pub fn rows_to_records(rows: Vec<EventRow>) -> StoreResult<Vec<EventRecord>> {
    let mut records = rows
        .into_iter()
        .map(row_to_record)
        .collect::<StoreResult<Vec<_>>>()?;
    records.sort_by_key(|record| record.sequence_number);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn row(sequence_number: i64, payload: Value) -> EventRow {
        EventRow {
            sequence_number,
            occurred_at: Utc::now(),
            event_type: "Deposited".into(),
            payload,
        }
    }

    #[test]
    fn test_insert_params_keep_order() {
        let events = vec![
            Event::from_json("Opened", json!({"accountId": "a-1"})).unwrap(),
            Event::empty("Closed"),
        ];
        let (types, payloads) = insert_params(&events);
        assert_eq!(types, SqlParam::TextArray(vec!["Opened".into(), "Closed".into()]));
        assert_eq!(
            payloads,
            SqlParam::JsonbArray(vec![r#"{"accountId":"a-1"}"#.into(), "{}".into()])
        );
    }

    #[test]
    fn test_payload_object_or_text() {
        let decoded = row_to_record(row(3, json!({"amount": 10}))).unwrap();
        assert_eq!(decoded.sequence_number, 3);
        assert_eq!(decoded.payload["amount"], json!(10));

        let from_text = row_to_record(row(4, json!(r#"{"amount": 12}"#))).unwrap();
        assert_eq!(from_text.payload["amount"], json!(12));
    }

    #[test]
    fn test_bad_rows_are_rejected() {
        assert!(matches!(
            row_to_record(row(1, json!([1, 2]))),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(matches!(
            row_to_record(row(1, json!("not json"))),
            Err(StoreError::Serialization(_))
        ));
        assert!(matches!(
            row_to_record(row(-1, json!({}))),
            Err(StoreError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_rows_are_sorted() {
        let records = rows_to_records(vec![row(5, json!({})), row(2, json!({}))]).unwrap();
        assert_eq!(
            records.iter().map(|r| r.sequence_number).collect::<Vec<_>>(),
            vec![2, 5]
        );
    }
}
