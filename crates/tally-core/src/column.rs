//! Column value mapping: raw column entries to [`ColumnValue`] and
//! [`MappableValue`].
//!
//! A column's `value` has no fixed schema per column type. It is classified
//! by a best-effort parse into [`ParsedValue`], and every branch has an
//! explicit fallback, so mapping never fails.

use serde_json::{Map, Value};
use tracing::trace;

use crate::model::{ColumnValue, MappableColumnValues, MappableValue, RawColumnValue};

/// Result of a best-effort parse of a column `value`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    /// `value` was absent, null, or not a string.
    Absent,
    /// `value` decoded to a JSON object.
    Object(Map<String, Value>),
    /// `value` decoded to a JSON string, e.g. `"\"5\""`.
    Text(String),
    /// `value` decoded to some other JSON (number, bool, array, null).
    Other(Value),
    /// `value` was a string that is not JSON; treated as opaque text.
    Opaque(String),
}

/// Classify a column `value` by attempting to decode it as JSON.
#[must_use]
pub fn parse_value(value: &Value) -> ParsedValue {
    let Value::String(raw) = value else {
        return ParsedValue::Absent;
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => ParsedValue::Object(map),
        Ok(Value::String(s)) => ParsedValue::Text(s),
        Ok(other) => ParsedValue::Other(other),
        Err(err) => {
            trace!(error = %err, "column value is not JSON, keeping it as opaque text");
            ParsedValue::Opaque(raw.clone())
        }
    }
}

/// Map one raw column entry to its normalized shape.
#[must_use]
pub fn map_column_value(raw: &RawColumnValue) -> ColumnValue {
    let column = raw.column.as_ref();
    ColumnValue {
        id: raw.id.clone(),
        value: raw.value.clone(),
        text: raw.text.clone(),
        display_value: raw.display_value.clone(),
        title: column.and_then(|c| c.title.clone()),
        additional_info: column.and_then(|c| c.settings_str.clone()),
        linked_item_ids: raw.linked_item_ids.clone(),
    }
}

/// Map every raw column entry of an item, preserving order.
#[must_use]
pub fn map_column_values(raw: &[RawColumnValue]) -> Vec<ColumnValue> {
    raw.iter().map(map_column_value).collect()
}

/// Build the mappable value for one raw column entry.
///
/// Rules, in order:
/// 1. a `value` that decodes to an object becomes that object, overlaid with
///    `text`, `display_value` and `linked_item_ids` when present;
/// 2. any other string `value` becomes `text ?? display_value ?? <decoded value>`,
///    where a decoded `null` stays null and text that is not JSON is kept raw;
/// 3. an absent or non-string `value` becomes `text ?? display_value ?? null`;
/// 4. a falsy `value` with `linked_item_ids` always becomes
///    `{linked_item_ids, text: text ?? display_value ?? null}`.
#[must_use]
pub fn build_mappable(raw: &RawColumnValue) -> MappableValue {
    let fallback = raw.text.clone().or_else(|| raw.display_value.clone());

    if let (true, Some(ids)) = (is_falsy(&raw.value), &raw.linked_item_ids) {
        let mut map = Map::new();
        map.insert("linked_item_ids".to_string(), id_array(ids));
        map.insert(
            "text".to_string(),
            fallback.map_or(Value::Null, Value::String),
        );
        return MappableValue::Object(map);
    }

    match parse_value(&raw.value) {
        ParsedValue::Object(mut map) => {
            if let Some(text) = &raw.text {
                map.insert("text".to_string(), Value::String(text.clone()));
            }
            if let Some(display) = &raw.display_value {
                map.insert("display_value".to_string(), Value::String(display.clone()));
            }
            if let Some(ids) = &raw.linked_item_ids {
                map.insert("linked_item_ids".to_string(), id_array(ids));
            }
            MappableValue::Object(map)
        }
        ParsedValue::Text(decoded) => MappableValue::Text(fallback.unwrap_or(decoded)),
        ParsedValue::Other(Value::Null) | ParsedValue::Absent => {
            fallback.map_or(MappableValue::Null, MappableValue::Text)
        }
        ParsedValue::Other(decoded) => {
            fallback.map_or(MappableValue::Json(decoded), MappableValue::Text)
        }
        ParsedValue::Opaque(raw_text) => MappableValue::Text(fallback.unwrap_or(raw_text)),
    }
}

/// Build the column id -> mappable map for an item. A repeated column id
/// keeps the last entry.
#[must_use]
pub fn build_mappables(raw: &[RawColumnValue]) -> MappableColumnValues {
    raw.iter()
        .map(|cv| (cv.id.clone(), build_mappable(cv)))
        .collect()
}

fn id_array(ids: &[String]) -> Value {
    Value::Array(ids.iter().cloned().map(Value::String).collect())
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawColumn;
    use serde_json::json;

    fn raw(value: Value, text: Option<&str>) -> RawColumnValue {
        RawColumnValue {
            id: "col".into(),
            value,
            text: text.map(str::to_string),
            ..RawColumnValue::default()
        }
    }

    #[test]
    fn parse_value_classifies_shapes() {
        assert_eq!(parse_value(&json!(null)), ParsedValue::Absent);
        assert_eq!(parse_value(&json!(5)), ParsedValue::Absent);
        assert_eq!(
            parse_value(&json!("\"5\"")),
            ParsedValue::Text("5".to_string())
        );
        assert_eq!(parse_value(&json!("12")), ParsedValue::Other(json!(12)));
        assert_eq!(
            parse_value(&json!("plain words")),
            ParsedValue::Opaque("plain words".to_string())
        );
        assert!(matches!(
            parse_value(&json!("{\"index\":1}")),
            ParsedValue::Object(_)
        ));
    }

    #[test]
    fn map_column_value_copies_column_metadata() {
        let mut entry = raw(json!("\"x\""), Some("x"));
        entry.column = Some(RawColumn {
            title: Some("Status".into()),
            settings_str: Some("{}".into()),
        });
        let cv = map_column_value(&entry);
        assert_eq!(cv.title.as_deref(), Some("Status"));
        assert_eq!(cv.additional_info.as_deref(), Some("{}"));
        assert_eq!(cv.text.as_deref(), Some("x"));
        assert_eq!(cv.linked_item_ids, None);
    }

    #[test]
    fn object_value_is_overlaid_with_text() {
        let mut entry = raw(json!("{\"index\":1,\"text\":\"stale\"}"), Some("Done"));
        entry.display_value = Some("Done!".into());
        let mapped = build_mappable(&entry);
        assert_eq!(
            serde_json::to_value(&mapped).expect("serialize"),
            json!({"index": 1, "text": "Done", "display_value": "Done!"})
        );
    }

    #[test]
    fn opaque_value_prefers_text_then_raw_string() {
        assert_eq!(
            build_mappable(&raw(json!("not json"), Some("shown"))),
            MappableValue::Text("shown".into())
        );
        assert_eq!(
            build_mappable(&raw(json!("not json"), None)),
            MappableValue::Text("not json".into())
        );
    }

    #[test]
    fn json_string_value_decodes_when_no_text() {
        assert_eq!(
            build_mappable(&raw(json!("\"5\""), None)),
            MappableValue::Text("5".into())
        );
    }

    #[test]
    fn decoded_scalars_keep_their_json_type() {
        assert_eq!(build_mappable(&raw(json!("null"), None)), MappableValue::Null);
        assert_eq!(
            build_mappable(&raw(json!("null"), Some("shown"))),
            MappableValue::Text("shown".into())
        );
        assert_eq!(
            serde_json::to_value(build_mappable(&raw(json!("12"), None))).expect("serialize"),
            json!(12)
        );
        assert_eq!(
            build_mappable(&raw(json!("true"), Some("Yes"))),
            MappableValue::Text("Yes".into())
        );
    }

    #[test]
    fn absent_value_falls_back_to_text_display_or_null() {
        assert_eq!(build_mappable(&raw(json!(null), None)), MappableValue::Null);

        let mut entry = raw(json!(null), None);
        entry.display_value = Some("Shown".into());
        assert_eq!(build_mappable(&entry), MappableValue::Text("Shown".into()));
    }

    #[test]
    fn falsy_value_with_links_becomes_link_object() {
        let mut entry = raw(json!(null), None);
        entry.linked_item_ids = Some(vec!["42".into()]);
        entry.display_value = Some("Linked Name".into());
        assert_eq!(
            serde_json::to_value(build_mappable(&entry)).expect("serialize"),
            json!({"linked_item_ids": ["42"], "text": "Linked Name"})
        );

        let mut empty = raw(json!(""), None);
        empty.linked_item_ids = Some(vec![]);
        assert_eq!(
            serde_json::to_value(build_mappable(&empty)).expect("serialize"),
            json!({"linked_item_ids": [], "text": null})
        );
    }

    #[test]
    fn mappables_have_one_entry_per_column() {
        let mut a = raw(json!(null), Some("a"));
        a.id = "a".into();
        let mut b = raw(json!(null), Some("b"));
        b.id = "b".into();
        let mut b_again = raw(json!(null), Some("b2"));
        b_again.id = "b".into();

        let mappables = build_mappables(&[a, b, b_again]);
        assert_eq!(mappables.len(), 2);
        assert_eq!(mappables["b"], MappableValue::Text("b2".into()));
    }
}
