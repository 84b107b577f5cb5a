//! Lenient field deserializers for raw API records.
//!
//! The query layer is loosely typed: ids arrive as strings or numbers, text
//! fields are occasionally scalars, and relation id lists may be missing or
//! hold mixed scalars. These helpers coerce what they can and fall back to
//! `None` instead of failing the whole record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::trace;

use crate::numeric::format_number;

/// String-coerce a JSON scalar id. Non-scalars and empty strings yield `None`.
#[must_use]
pub fn coerce_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(number_to_string(n)),
        _ => None,
    }
}

/// String-coerce any JSON scalar into text. `null`, arrays and objects yield `None`.
#[must_use]
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_to_string(n)),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number_to_string(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map_or_else(|| n.to_string(), format_number)
    }
}

/// Deserialize an id that may be a string or a number. Missing or
/// unusable ids become the empty string.
pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_id(&value).unwrap_or_default())
}

/// Deserialize an optional text field, coercing scalars to strings.
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_text(&value))
}

/// Deserialize an optional list of ids. A non-array becomes `None`; entries
/// that cannot be coerced are dropped.
pub fn opt_id_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(entries) => Some(entries.iter().filter_map(coerce_id).collect()),
        _ => None,
    })
}

/// Deserialize an optional nested record. A shape that does not fit `T`
/// degrades to `None` rather than failing the enclosing record.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value)
        .map_err(|err| trace!(error = %err, "dropping malformed nested field"))
        .ok())
}

/// Deserialize a list, treating `null` or a non-array as empty.
pub fn list_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(_) => serde_json::from_value(value).map_err(serde::de::Error::custom),
        _ => Ok(Vec::new()),
    }
}
