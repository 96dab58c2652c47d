//! Canonicalization of duck-typed response bodies.
//!
//! The API is inconsistent about envelopes: list endpoints answer with a raw
//! array or with an object keyed by `items`, a domain name such as
//! `notifications`, plus `total` or `totalDocuments`. Every shape decision
//! lives here so call sites only ever see `Page<T>` and plain entities.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::types::Page;

const TOTAL_KEYS: [&str; 3] = ["total", "totalDocuments", "count"];

pub(crate) fn parse_json(body: &str) -> Result<Value, ApiError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// `Some(message)` when a 2xx body still reports `"success": false`.
pub(crate) fn rejection(value: &Value) -> Option<String> {
    if value.get("success").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    let message = ["message", "error"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .next()
        .unwrap_or_default();
    Some(message.to_string())
}

/// Unwrap a `{"data": ...}` envelope when the payload is nested in one.
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") && !map.contains_key("id") && !map.contains_key("_id") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Canonicalize a list response. `keys` are the domain-specific array keys
/// to try before the generic `items`.
pub(crate) fn page<T: DeserializeOwned>(value: Value, keys: &[&str]) -> Result<Page<T>, ApiError> {
    let value = unwrap_data(value);
    let (raw_items, total) = match value {
        Value::Array(items) => {
            let total = items.len();
            (items, Some(total))
        }
        Value::Object(mut map) => {
            let items = keys
                .iter()
                .chain(std::iter::once(&"items"))
                .find_map(|key| match map.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .unwrap_or_default();
            let total = TOTAL_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_u64))
                .map(|n| n as usize);
            (items, total)
        }
        Value::Null => (Vec::new(), Some(0)),
        other => {
            return Err(ApiError::DeserializationError(format!(
                "expected a list response, got {other}"
            )))
        }
    };

    let items = raw_items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
    let total = total.unwrap_or(items.len());
    Ok(Page { items, total })
}

/// Canonicalize a single-entity response that may be wrapped under `key`.
pub(crate) fn entity<T: DeserializeOwned>(value: Value, key: &str) -> Result<T, ApiError> {
    let value = unwrap_data(value);
    let inner = match value {
        Value::Object(mut map) if map.get(key).is_some_and(Value::is_object) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    };
    serde_json::from_value(inner).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Like `entity`, but an empty or non-object body is `None` rather than an error.
pub(crate) fn optional_entity<T: DeserializeOwned>(value: Value, key: &str) -> Option<T> {
    match unwrap_data(value) {
        Value::Null => None,
        value => entity(value, key).ok(),
    }
}

/// Unread count as `{"count": n}`, `{"unreadCount": n}` or a bare number.
pub(crate) fn count(value: Value) -> Result<u64, ApiError> {
    let value = unwrap_data(value);
    let found = match &value {
        Value::Number(n) => n.as_u64(),
        Value::Object(map) => ["count", "unreadCount"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_u64)),
        Value::Null => Some(0),
        _ => None,
    };
    found.ok_or_else(|| ApiError::DeserializationError(format!("expected a count, got {value}")))
}
