//! Filter and predicate matching
//!
//! This is the reference semantics for queries. The memory engine uses it
//! directly; the durable engine approximates it with JSON containment.

use serde_json::{Number, Value};

use crate::types::{Event, EventFilter, EventQuery, EventRecord, Payload};

/// Whether `predicate` is a deep subset of `value`
///
/// - `null` predicate matches anything.
/// - Scalars compare by value; numbers compare numerically (`1 == 1.0`).
/// - Arrays: every predicate element must match some payload element.
///   Payload elements may be reused and position does not matter.
/// - Objects: every predicate key must exist in the payload and its value
///   must match recursively. Extra payload keys are ignored.
/// - Any other pairing (array vs object, array vs scalar, ...) is false.
pub fn deep_subset(predicate: &Value, value: &Value) -> bool {
    match (predicate, value) {
        (Value::Null, _) => true,
        (_, Value::Null) => false,
        (Value::Bool(p), Value::Bool(v)) => p == v,
        (Value::Number(p), Value::Number(v)) => numbers_equal(p, v),
        (Value::String(p), Value::String(v)) => p == v,
        (Value::Array(p), Value::Array(v)) => p
            .iter()
            .all(|wanted| v.iter().any(|candidate| deep_subset(wanted, candidate))),
        (Value::Object(p), Value::Object(v)) => map_subset(p, v),
        _ => false,
    }
}

/// Integers compare exactly; floats only come into play when one side is one
fn numbers_equal(p: &Number, v: &Number) -> bool {
    if let (Some(p), Some(v)) = (p.as_i64(), v.as_i64()) {
        return p == v;
    }
    if let (Some(p), Some(v)) = (p.as_u64(), v.as_u64()) {
        return p == v;
    }
    if p.is_f64() || v.is_f64() {
        return p.as_f64() == v.as_f64();
    }
    // One negative i64 against a u64 above i64::MAX
    false
}

/// Whether every key of `predicate` is present in `payload` with a matching value
pub fn map_subset(predicate: &Payload, payload: &Payload) -> bool {
    predicate.iter().all(|(key, wanted)| {
        payload
            .get(key)
            .is_some_and(|actual| deep_subset(wanted, actual))
    })
}

/// Type/payload pair a filter can be evaluated against
pub trait Matchable {
    fn event_type(&self) -> &str;
    fn payload(&self) -> &Payload;
}

impl Matchable for Event {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn payload(&self) -> &Payload {
        &self.payload
    }
}

impl Matchable for EventRecord {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// Whether an event matches a single filter
pub fn matches_filter<E: Matchable + ?Sized>(event: &E, filter: &EventFilter) -> bool {
    let type_ok =
        filter.event_types.is_empty() || filter.event_types.contains(event.event_type());
    if !type_ok {
        return false;
    }

    filter.payload_predicates.is_empty()
        || filter
            .payload_predicates
            .iter()
            .any(|predicate| map_subset(predicate, event.payload()))
}

/// Whether an event matches any filter of the query (empty query matches all)
pub fn matches_query<E: Matchable + ?Sized>(event: &E, query: &EventQuery) -> bool {
    query.filters.is_empty() || query.filters.iter().any(|f| matches_filter(event, f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn event(event_type: &str, value: Value) -> Event {
        Event::from_json(event_type, value).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = EventFilter::all();
        assert!(matches_filter(&event("t1", json!({})), &filter));
        assert!(matches_filter(&event("other", json!({"a": [1, {"b": null}]})), &filter));
    }

    #[test]
    fn test_type_membership() {
        let filter = EventFilter::new(["t1", "t2"]);
        assert!(matches_filter(&event("t1", json!({})), &filter));
        assert!(matches_filter(&event("t2", json!({})), &filter));
        assert!(!matches_filter(&event("t3", json!({})), &filter));
    }

    #[test]
    fn test_predicates_are_or_ed() {
        let filter = EventFilter::new(["Deposited"])
            .with_payload_predicate(payload(json!({"accountId": "a-1"})))
            .with_payload_predicate(payload(json!({"accountId": "a-2"})));

        assert!(matches_filter(&event("Deposited", json!({"accountId": "a-2", "amount": 5})), &filter));
        assert!(!matches_filter(&event("Deposited", json!({"accountId": "a-3"})), &filter));
        // Type check still applies
        assert!(!matches_filter(&event("Withdrawn", json!({"accountId": "a-1"})), &filter));
    }

    #[test]
    fn test_nested_object_subset() {
        let predicate = json!({"customer": {"address": {"city": "Berlin"}}});
        let value = json!({
            "customer": {"name": "Ada", "address": {"city": "Berlin", "zip": "10115"}},
            "total": 12
        });
        assert!(deep_subset(&predicate, &value));
        assert!(!deep_subset(&json!({"customer": {"address": {"city": "Paris"}}}), &value));
    }

    #[test]
    fn test_missing_key_fails() {
        let value = json!({"a": 1});
        assert!(!deep_subset(&json!({"b": 1}), &value));
        // A null predicate value is a wildcard for the value, not for the key
        assert!(!deep_subset(&json!({"b": null}), &value));
        assert!(deep_subset(&json!({"a": null}), &value));
    }

    #[test]
    fn test_array_subset_is_not_positional() {
        let value = json!({"tags": ["red", "green", "blue"]});
        assert!(deep_subset(&json!({"tags": ["blue", "red"]}), &value));
        assert!(deep_subset(&json!({"tags": ["red", "red"]}), &value));
        assert!(deep_subset(&json!({"tags": []}), &value));
        assert!(!deep_subset(&json!({"tags": ["yellow"]}), &value));
    }

    #[test]
    fn test_array_of_objects() {
        let value = json!({"lines": [{"sku": "A", "qty": 1}, {"sku": "B", "qty": 3}]});
        assert!(deep_subset(&json!({"lines": [{"sku": "B"}]}), &value));
        assert!(!deep_subset(&json!({"lines": [{"sku": "B", "qty": 1}]}), &value));
    }

    #[test]
    fn test_shape_mismatch() {
        assert!(!deep_subset(&json!([1]), &json!(1)));
        assert!(!deep_subset(&json!(1), &json!([1])));
        assert!(!deep_subset(&json!({"a": 1}), &json!([{"a": 1}])));
        assert!(!deep_subset(&json!("1"), &json!(1)));
        assert!(!deep_subset(&json!(1), &Value::Null));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(deep_subset(&json!(1), &json!(1.0)));
        assert!(deep_subset(&json!({"amount": 10}), &json!({"amount": 10.0})));
        assert!(!deep_subset(&json!(1), &json!(2)));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        // Both round to the same f64
        let wanted = json!({"accountId": 9_007_199_254_740_993u64});
        let stored = json!({"accountId": 9_007_199_254_740_992u64});
        assert!(!deep_subset(&wanted, &stored));
        assert!(deep_subset(&wanted, &wanted.clone()));

        assert!(!deep_subset(&json!(u64::MAX), &json!(u64::MAX - 1)));
        assert!(!deep_subset(&json!(i64::MIN), &json!(i64::MIN + 1)));
        assert!(!deep_subset(&json!(-1), &json!(u64::MAX)));
        assert!(deep_subset(&json!(7u64), &json!(7i64)));

        let filter = EventFilter::all().with_payload_predicate(payload(wanted));
        assert!(!matches_filter(&event("Deposited", stored), &filter));
    }

    #[test]
    fn test_query_or_across_filters() {
        let query = EventQuery::new(vec![EventFilter::new(["t1"]), EventFilter::new(["t2"])]);
        assert!(matches_query(&event("t1", json!({})), &query));
        assert!(matches_query(&event("t2", json!({})), &query));
        assert!(!matches_query(&event("t3", json!({})), &query));
        assert!(matches_query(&event("t3", json!({})), &EventQuery::all()));
    }
}
