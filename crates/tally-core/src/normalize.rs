//! Per-item normalization (phase one).
//!
//! Maps an item's own columns, its parent (one level, fields and columns
//! only) and its subitems, then recomputes rollup columns from the freshly
//! mapped subitems. Cross-board columns are left for the batch phase in
//! [`crate::pipeline`], which needs the resolved linked items.

use tracing::debug;

use crate::aggregate::aggregate_rollups;
use crate::column::{build_mappables, map_column_values};
use crate::model::{
    ItemHeader, NormalizedItem, NormalizedParent, NormalizedSubitem, RawItem,
};

/// Normalize one raw item. Never fails and performs no I/O.
#[must_use]
pub fn normalize(raw: RawItem) -> NormalizedItem {
    let header = ItemHeader::from_raw(&raw);
    let column_values = map_column_values(&raw.column_values);
    let mappable_column_values = build_mappables(&raw.column_values);
    let parent_item = raw.parent_item.as_deref().map(normalize_parent);
    let subitems: Vec<NormalizedSubitem> = raw.subitems.iter().map(normalize_subitem).collect();

    let mut item = NormalizedItem {
        header,
        email: raw.email,
        column_values,
        mappable_column_values,
        assets: raw.assets,
        parent_item,
        subitems,
    };

    let rollups = aggregate_rollups(&mut item);
    if rollups > 0 {
        debug!(item = %item.header.id, rollups, "recomputed rollup columns");
    }
    item
}

/// Normalize a subitem: mapped columns and mappables, no aggregation.
#[must_use]
pub fn normalize_subitem(raw: &RawItem) -> NormalizedSubitem {
    NormalizedSubitem {
        header: ItemHeader::from_raw(raw),
        column_values: map_column_values(&raw.column_values),
        mappable_column_values: build_mappables(&raw.column_values),
    }
}

/// Normalize a parent item: fields and mapped columns only.
#[must_use]
pub fn normalize_parent(raw: &RawItem) -> NormalizedParent {
    NormalizedParent {
        header: ItemHeader::from_raw(raw),
        column_values: map_column_values(&raw.column_values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawItem {
        serde_json::from_value(value).expect("raw item should deserialize")
    }

    #[test]
    fn parent_is_one_level_deep() {
        let item = normalize(raw(json!({
            "id": "1",
            "name": "Child",
            "parent_item": {
                "id": "P1",
                "name": "Parent",
                "column_values": [
                    {"id": "parent_col", "text": "Parent Text", "value": "\"val\"",
                     "column": {"title": "Parent Col", "settings_str": "{}"}}
                ],
                "subitems": [{"id": "ignored"}]
            }
        })));

        let parent = item.parent_item.expect("parent should be kept");
        assert_eq!(parent.header.id, "P1");
        assert_eq!(parent.column_values[0].title.as_deref(), Some("Parent Col"));

        let wire = serde_json::to_value(
            normalize(raw(json!({"id": "1", "parent_item": {"id": "P1"}}))),
        )
        .expect("serialize");
        let parent_wire = &wire["parent_item"];
        assert!(parent_wire.get("subitems").is_none());
        assert!(parent_wire.get("mappable_column_values").is_none());
        assert!(parent_wire.get("assets").is_none());
    }

    #[test]
    fn subitems_get_columns_and_mappables() {
        let item = normalize(raw(json!({
            "id": "1",
            "subitems": [{
                "id": "s1",
                "board": {"id": "B2"},
                "column_values": [{"id": "num", "text": "5", "value": "\"5\""}]
            }]
        })));
        let sub = &item.subitems[0];
        assert_eq!(sub.header.board, json!({"id": "B2"}));
        assert_eq!(sub.column_values[0].text.as_deref(), Some("5"));
        assert!(sub.mappable_column_values.contains_key("num"));
    }

    #[test]
    fn opaque_fields_pass_through() {
        let item = normalize(raw(json!({
            "id": 7,
            "email": "item@test.com",
            "state": "active",
            "group": {"id": "g", "title": "Group", "deleted": false},
            "assets": [{"id": "a1", "name": "file.pdf", "url": "https://x"}]
        })));
        assert_eq!(item.header.id, "7");
        assert_eq!(item.email, json!("item@test.com"));
        assert_eq!(item.header.state, json!("active"));
        assert_eq!(item.assets.len(), 1);
        assert!(item.parent_item.is_none());
        assert!(item.subitems.is_empty());
    }

    #[test]
    fn cross_board_columns_are_not_touched_in_phase_one() {
        let item = normalize(raw(json!({
            "id": "1",
            "column_values": [{
                "id": "link",
                "text": null,
                "value": null,
                "display_value": "Linked Name",
                "linked_item_ids": ["42"],
                "column": {"title": "Link", "settings_str":
                    "{\"relation_column\":{\"link\":true},\"displayed_linked_columns\":{\"999\":[\"price\"]}}"}
            }]
        })));
        assert_eq!(item.column_values[0].text, None);
    }
}
