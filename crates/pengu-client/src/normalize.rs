//! Identifier normalization at the wire boundary.
//!
//! The backend is inconsistent about primary keys: some endpoints emit the
//! raw document key `_id`, others the canonical `id`. Every record entering
//! a collection cache passes through here exactly once, so the rest of the
//! client only ever sees `id`. Nested sub-record arrays (order milestones,
//! quote negotiation history, payout methods) are normalized with the same
//! rule, independently of their parent.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Rewrite a server record into canonical shape.
///
/// If `_id` is present it becomes `id` (overwriting any existing `id`);
/// otherwise the record is left as found. Array-valued fields holding
/// objects are normalized element-wise. Pure and total: non-object values
/// pass through untouched.
pub fn normalize_record(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_map(map)),
        other => other,
    }
}

fn normalize_map(mut map: Map<String, Value>) -> Map<String, Value> {
    if let Some(raw_id) = map.remove("_id") {
        map.insert("id".to_string(), raw_id);
    }

    for (_field, value) in map.iter_mut() {
        if let Value::Array(items) = value {
            for item in items.iter_mut() {
                if item.is_object() {
                    let taken = std::mem::take(item);
                    *item = normalize_record(taken);
                }
            }
        }
    }

    map
}

/// Normalize then deserialize a single entity.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(normalize_record(value))
}

/// Normalize then deserialize a collection response.
///
/// `null` decodes as the empty collection; anything that is neither an array
/// nor `null` is a decode error.
pub fn decode_list<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, serde_json::Error> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => return serde_json::from_value(other),
    };
    items.into_iter().map(decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_raw_key_over_canonical() {
        let normalized = normalize_record(json!({"_id": "raw", "id": "canonical", "name": "x"}));
        assert_eq!(normalized["id"], "raw");
        assert!(normalized.get("_id").is_none());
        assert_eq!(normalized["name"], "x");
    }

    #[test]
    fn keeps_canonical_key_when_raw_absent() {
        let normalized = normalize_record(json!({"id": "canonical"}));
        assert_eq!(normalized["id"], "canonical");
    }

    #[test]
    fn absent_keys_pass_through() {
        let normalized = normalize_record(json!({"name": "no id at all"}));
        assert!(normalized.get("id").is_none());
        assert_eq!(normalized["name"], "no id at all");
    }

    #[test]
    fn normalizes_nested_sub_record_arrays() {
        let normalized = normalize_record(json!({
            "_id": "o1",
            "milestones": [
                {"_id": "m1", "status": "PENDING"},
                {"id": "m2", "status": "APPROVED"}
            ],
            "tags": ["plain", "strings"]
        }));
        assert_eq!(normalized["id"], "o1");
        assert_eq!(normalized["milestones"][0]["id"], "m1");
        assert!(normalized["milestones"][0].get("_id").is_none());
        assert_eq!(normalized["milestones"][1]["id"], "m2");
        assert_eq!(normalized["tags"], json!(["plain", "strings"]));
    }

    #[test]
    fn non_object_values_are_untouched() {
        assert_eq!(normalize_record(json!(42)), json!(42));
        assert_eq!(normalize_record(Value::Null), Value::Null);
    }

    #[test]
    fn decode_list_treats_null_as_empty() {
        let empty: Vec<serde_json::Value> = decode_list(Value::Null).unwrap();
        assert!(empty.is_empty());
    }
}
