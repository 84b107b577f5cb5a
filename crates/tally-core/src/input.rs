//! Locating item arrays inside query responses.
//!
//! Item queries come back in a handful of envelopes depending on the query
//! used: by ids (`data.items`), by board and group
//! (`data.boards[].groups[].items_page.items`), by board
//! (`data.boards[].items_page.items`), by column value
//! (`data.items_page_by_column_values.items`), or a follow-up page
//! (`data.next_items_page.items`). Plain arrays, `{ "items": [...] }` and a
//! single item object are accepted too.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::{LinkedItem, RawItem};

/// Errors raised while reading an input document.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The document is not JSON at all.
    #[error("input is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A GraphQL response with `errors` and no usable `data`.
    #[error("query response reported errors: {0}")]
    Query(String),

    /// No recognizable item array.
    #[error(
        "no items found: expected an item array, an `items` field, or a query `data` envelope"
    )]
    NoItems,

    /// An entry in the item array is not an item.
    #[error("item #{index} is malformed: {source}")]
    Item {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse raw items from JSON text.
///
/// # Errors
///
/// See [`InputError`].
pub fn parse_items(text: &str) -> Result<Vec<RawItem>, InputError> {
    extract_items(serde_json::from_str(text)?)
}

/// Extract raw items from a parsed document.
///
/// # Errors
///
/// See [`InputError`].
pub fn extract_items(document: Value) -> Result<Vec<RawItem>, InputError> {
    extract(document)
}

/// Parse linked items (the fetch collaborator's response) from JSON text.
///
/// # Errors
///
/// See [`InputError`].
pub fn parse_linked_items(text: &str) -> Result<Vec<LinkedItem>, InputError> {
    extract_linked_items(serde_json::from_str(text)?)
}

/// Extract linked items from a parsed document.
///
/// # Errors
///
/// See [`InputError`].
pub fn extract_linked_items(document: Value) -> Result<Vec<LinkedItem>, InputError> {
    extract(document)
}

fn extract<T: DeserializeOwned>(document: Value) -> Result<Vec<T>, InputError> {
    let entries = locate_items(document)?;
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(entry).map_err(|source| InputError::Item { index, source })
        })
        .collect()
}

fn locate_items(document: Value) -> Result<Vec<Value>, InputError> {
    match document {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut root) => {
            if let Some(data) = root.remove("data").filter(|d| !d.is_null()) {
                return items_in_data(data).ok_or(InputError::NoItems);
            }
            if let Some(errors) = root.get("errors") {
                return Err(InputError::Query(error_messages(errors)));
            }
            if let Some(Value::Array(entries)) = root.remove("items") {
                return Ok(entries);
            }
            if root.contains_key("id") && root.contains_key("column_values") {
                return Ok(vec![Value::Object(root)]);
            }
            Err(InputError::NoItems)
        }
        _ => Err(InputError::NoItems),
    }
}

fn items_in_data(mut data: Value) -> Option<Vec<Value>> {
    if let Some(Value::Array(entries)) = data.get_mut("items").map(Value::take) {
        return Some(entries);
    }

    for page_key in ["items_page_by_column_values", "next_items_page"] {
        if let Some(entries) = data.get_mut(page_key).and_then(take_page_items) {
            return Some(entries);
        }
    }

    let Some(Value::Array(boards)) = data.get_mut("boards").map(Value::take) else {
        return None;
    };
    let mut found = false;
    let mut items = Vec::new();
    for mut board in boards {
        if let Some(entries) = board.get_mut("items_page").and_then(take_page_items) {
            found = true;
            items.extend(entries);
        }
        if let Some(Value::Array(groups)) = board.get_mut("groups").map(Value::take) {
            for mut group in groups {
                if let Some(entries) = group.get_mut("items_page").and_then(take_page_items) {
                    found = true;
                    items.extend(entries);
                }
            }
        }
    }
    found.then_some(items)
}

fn take_page_items(page: &mut Value) -> Option<Vec<Value>> {
    match page.get_mut("items").map(Value::take) {
        Some(Value::Array(entries)) => Some(entries),
        _ => None,
    }
}

fn error_messages(errors: &Value) -> String {
    match errors {
        Value::Array(entries) if !entries.is_empty() => entries
            .iter()
            .map(|e| {
                e.get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| e.to_string(), str::to_string)
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}
