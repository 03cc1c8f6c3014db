//! Field normalization for values the backend encodes inconsistently.
//!
//! | helper            | accepts                                        | yields      |
//! |-------------------|------------------------------------------------|-------------|
//! | `flat_string`     | string, number, bool, null, `{"k": ...}`       | `String`    |
//! | `lenient_i64`     | integer, float, numeric string, nested object  | `i64`       |
//! | `nested`          | object, JSON-encoded string, byte array        | any `T`     |
//!
//! Every helper goes through a `serde_json::Value` so it works the same
//! whether the enclosing type is decoded from bytes or from a buffered
//! tagged-union body.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Reduce any JSON value to a scalar string.
///
/// Objects collapse to their first value, recursively (`{"threadFbId":
/// "1"}` becomes `"1"`). Numbers and booleans are stringified, null and
/// empty containers become `""`.
pub fn unwrap_value(value: &Value) -> String {
    let mut current = value;
    loop {
        match current {
            Value::Object(map) => match map.values().next() {
                Some(inner) => current = inner,
                None => return String::new(),
            },
            Value::Array(items) => match items.first() {
                Some(inner) => current = inner,
                None => return String::new(),
            },
            Value::String(s) => return s.clone(),
            Value::Number(n) => return n.to_string(),
            Value::Bool(b) => return b.to_string(),
            Value::Null => return String::new(),
        }
    }
}

/// Decode a document that may arrive as an object, as a JSON string, or
/// as an array of byte values holding UTF-8 JSON.
pub fn decode_nested<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    match value {
        Value::String(s) => serde_json::from_str(&s),
        Value::Array(items) if is_byte_array(&items) => {
            let bytes: Vec<u8> = items
                .iter()
                .filter_map(Value::as_u64)
                .map(|n| n as u8)
                .collect();
            serde_json::from_slice(&bytes)
        }
        other => serde_json::from_value(other),
    }
}

fn is_byte_array(items: &[Value]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|v| v.as_u64().map_or(false, |n| n <= u8::MAX as u64))
}

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(_) | Value::Array(_) => unwrap_value(value).trim().parse().ok(),
        Value::Bool(_) | Value::Null => None,
    }
}

// ── deserialize_with adapters ────────────────────────────────────────

pub fn flat_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(unwrap_value(&value))
}

pub fn opt_flat_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Null => None,
        other => Some(unwrap_value(&other)),
    })
}

pub fn flat_string_vec<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(unwrap_value).collect(),
        other => vec![unwrap_value(&other)],
    })
}

pub fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(d)?;
    value_to_i64(&value)
        .ok_or_else(|| D::Error::custom(format!("expected an integer, got {value}")))
}

pub fn opt_lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(d)?;
    match value {
        Value::Null => Ok(None),
        other => value_to_i64(&other)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected an integer, got {other}"))),
    }
}

pub fn nested<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(d)?;
    decode_nested(value).map_err(D::Error::custom)
}

pub fn opt_nested<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(d)?;
    match value {
        Value::Null => Ok(None),
        other => decode_nested(other).map(Some).map_err(D::Error::custom),
    }
}
