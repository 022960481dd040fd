//! Loose JSON-shape coercion helpers shared by every Booking API
//! response parser. The upstream platform is not consistent about
//! whether a list comes back as `data`, `list`, `rows`, etc., or
//! whether a value is wrapped a second time as a JSON string.

use serde_json::Value;

const LIST_KEYS: &[&str] = &[
    "data", "list", "rows", "records", "items", "content", "results", "result",
];

/// Recursively re-parses any string value that looks like embedded JSON.
pub fn maybe_parse_json(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            let looks_like_json = trimmed.len() >= 2
                && matches!(trimmed.chars().next(), Some('{') | Some('['))
                && matches!(trimmed.chars().last(), Some('}') | Some(']'));
            if looks_like_json {
                if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                    return maybe_parse_json(&parsed);
                }
            }
            value.clone()
        }
        Value::Object(map) => {
            let coerced = map
                .iter()
                .map(|(k, v)| (k.clone(), maybe_parse_json(v)))
                .collect();
            Value::Object(coerced)
        }
        Value::Array(items) => Value::Array(items.iter().map(maybe_parse_json).collect()),
        other => other.clone(),
    }
}

/// Finds the first list-shaped value in a payload, preferring the
/// well-known container keys before falling back to any list value.
pub fn extract_first_list(payload: &Value) -> Option<Vec<Value>> {
    match payload {
        Value::String(_) => {
            let coerced = maybe_parse_json(payload);
            if coerced != *payload {
                extract_first_list(&coerced)
            } else {
                None
            }
        }
        Value::Array(items) => Some(items.clone()),
        Value::Object(map) => {
            for key in LIST_KEYS {
                if let Some(v) = map.get(*key) {
                    if let Some(list) = extract_first_list(v) {
                        return Some(list);
                    }
                }
            }
            map.values().find_map(|v| match v {
                Value::Array(items) => Some(items.clone()),
                _ => None,
            })
        }
        _ => None,
    }
}

/// Loose truthiness coercion matching the upstream's inconsistent
/// boolean encodings (numbers, "1"/"true"/"yes"/"available"/"idle").
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f > 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.to_lowercase().as_str(),
            "1" | "true" | "y" | "yes" | "available" | "idle"
        ),
        _ => false,
    }
}

/// First string-ish field found among `keys`, as an owned `String`.
pub fn first_str(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        obj.get(*k).and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_first_list_prefers_well_known_keys() {
        let payload = json!({"unrelated": [1], "data": [1, 2, 3]});
        assert_eq!(extract_first_list(&payload).unwrap().len(), 3);
    }

    #[test]
    fn extract_first_list_falls_back_to_any_list() {
        let payload = json!({"weird_key": [1, 2]});
        assert_eq!(extract_first_list(&payload).unwrap().len(), 2);
    }

    #[test]
    fn maybe_parse_json_unwraps_embedded_json_strings() {
        let payload = json!({"data": "{\"a\":1}"});
        let parsed = maybe_parse_json(&payload);
        assert_eq!(parsed["data"]["a"], json!(1));
    }

    #[test]
    fn coerce_bool_handles_mixed_encodings() {
        assert!(coerce_bool(&json!(1)));
        assert!(coerce_bool(&json!("yes")));
        assert!(!coerce_bool(&json!("no")));
        assert!(coerce_bool(&json!(true)));
    }
}
