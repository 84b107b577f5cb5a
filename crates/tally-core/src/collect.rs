//! Linked-reference collection over a normalized batch.
//!
//! Relation columns expose foreign item ids in two places: the first-class
//! `linked_item_ids` field, and `linkedPulseIds[].linkedPulseId` inside the
//! serialized `value`. Both are read and unioned.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::column::{ParsedValue, parse_value};
use crate::de::coerce_id;
use crate::model::{ColumnValue, NormalizedItem};

/// Ids embedded in a serialized value as `{"linkedPulseIds":[{"linkedPulseId":..}]}`.
#[must_use]
pub fn linked_pulse_ids(value: &Value) -> Vec<String> {
    let ParsedValue::Object(map) = parse_value(value) else {
        return Vec::new();
    };
    let Some(Value::Array(pulses)) = map.get("linkedPulseIds") else {
        return Vec::new();
    };
    pulses
        .iter()
        .filter_map(|pulse| pulse.get("linkedPulseId").and_then(coerce_id))
        .collect()
}

/// Every foreign id a single column references, first-class ids first.
#[must_use]
pub fn column_references(cv: &ColumnValue) -> Vec<String> {
    let mut ids: Vec<String> = cv
        .linked_item_ids
        .iter()
        .flatten()
        .filter(|id| !id.is_empty())
        .cloned()
        .collect();
    ids.extend(linked_pulse_ids(&cv.value));
    ids
}

/// Union of foreign ids referenced by the top-level columns of every item.
#[must_use]
pub fn collect_linked_ids(items: &[NormalizedItem]) -> BTreeSet<String> {
    items
        .iter()
        .flat_map(|item| item.column_values.iter())
        .flat_map(column_references)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(columns: Vec<ColumnValue>) -> NormalizedItem {
        NormalizedItem {
            column_values: columns,
            ..NormalizedItem::default()
        }
    }

    fn column(value: Value, linked: Option<Vec<&str>>) -> ColumnValue {
        ColumnValue {
            id: "link".into(),
            value,
            linked_item_ids: linked.map(|ids| ids.into_iter().map(str::to_string).collect()),
            ..ColumnValue::default()
        }
    }

    #[test]
    fn pulse_ids_are_read_from_serialized_value() {
        let value = json!(r#"{"linkedPulseIds":[{"linkedPulseId":42},{"linkedPulseId":"43"},{}]}"#);
        assert_eq!(linked_pulse_ids(&value), vec!["42", "43"]);
    }

    #[test]
    fn non_object_values_have_no_pulse_ids() {
        assert!(linked_pulse_ids(&json!("not json")).is_empty());
        assert!(linked_pulse_ids(&json!("\"5\"")).is_empty());
        assert!(linked_pulse_ids(&json!(null)).is_empty());
        assert!(linked_pulse_ids(&json!(r#"{"linkedPulseIds":"nope"}"#)).is_empty());
    }

    #[test]
    fn both_sources_are_unioned_across_the_batch() {
        let batch = vec![
            item(vec![column(json!(null), Some(vec!["7", "8"]))]),
            item(vec![column(
                json!(r#"{"linkedPulseIds":[{"linkedPulseId":7},{"linkedPulseId":9}]}"#),
                None,
            )]),
        ];
        let ids: Vec<String> = collect_linked_ids(&batch).into_iter().collect();
        assert_eq!(ids, vec!["7", "8", "9"]);
    }

    #[test]
    fn empty_batch_collects_nothing() {
        assert!(collect_linked_ids(&[]).is_empty());
        assert!(collect_linked_ids(&[item(vec![])]).is_empty());
    }
}
