//! List-response normalization.
//!
//! Collection endpoints do not agree on an envelope. Some return a bare
//! array, others wrap it. `normalize_list` is the single place that knows the
//! shapes, checked in this order:
//!
//! 1. top-level array
//! 2. `data` array
//! 3. `items` array
//! 4. `data.items` array
//!
//! Anything else is an empty list.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ApiError;

/// Extract the item array from a list response without deserializing items.
pub fn list_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            data => {
                if let Some(Value::Array(items)) = map.remove("items") {
                    return items;
                }
                match data {
                    Some(Value::Object(mut data)) => match data.remove("items") {
                        Some(Value::Array(items)) => items,
                        _ => Vec::new(),
                    },
                    _ => Vec::new(),
                }
            }
        },
        _ => Vec::new(),
    }
}

/// Normalize a list response and deserialize each item.
pub fn normalize_list<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, ApiError> {
    list_items(value)
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse list item: {}", e)))
        })
        .collect()
}
