//! Relation aggregation: recompute a relation column's display text and
//! numeric value from its source records.
//!
//! Both relation kinds share one algorithm and differ only in where the
//! candidates come from:
//!
//! - rollup: the item's own subitems, in order;
//! - cross-board: the resolved [`LinkedItemIndex`], narrowed to the ids of
//!   sibling columns flagged `true` in `relation_column` when there are any,
//!   and filtered to the first target board.
//!
//! For each candidate the target column's text is read (falling back to its
//! decoded value), non-empty texts are joined with `", "`, and numeric texts
//! are summed. `value` is rewritten only when something was numeric.
//!
//! When nothing contributes, a rollup column's text becomes `null` while a
//! cross-board column keeps its previous text.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace};

use crate::collect::column_references;
use crate::column::{ParsedValue, parse_value};
use crate::model::{ColumnValue, MappableColumnValues, NormalizedItem};
use crate::numeric::{coerce_number, format_number};
use crate::relation::{RelationKind, RelationMetadata, parse_relation_metadata};
use crate::resolve::LinkedItemIndex;

/// Separator between aggregated texts.
pub const TEXT_SEPARATOR: &str = ", ";

/// Running join and sum over candidate texts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    texts: Vec<String>,
    sum: Option<f64>,
}

impl Tally {
    /// Add one candidate's resolved text. Empty or missing text contributes nothing.
    pub fn push(&mut self, text: Option<String>) {
        let Some(text) = text.filter(|t| !t.is_empty()) else {
            return;
        };
        if let Some(n) = coerce_number(&text) {
            self.sum = Some(self.sum.unwrap_or(0.0) + n);
        }
        self.texts.push(text);
    }

    /// Contributing texts joined with [`TEXT_SEPARATOR`], or `None` if there were none.
    #[must_use]
    pub fn joined_text(&self) -> Option<String> {
        if self.texts.is_empty() {
            None
        } else {
            Some(self.texts.join(TEXT_SEPARATOR))
        }
    }

    /// The sum as a JSON-encoded decimal string (`"\"20\""`), if anything was numeric.
    #[must_use]
    pub fn encoded_sum(&self) -> Option<Value> {
        self.sum
            .map(|sum| Value::String(Value::String(format_number(sum)).to_string()))
    }
}

/// Resolve the display text of one target cell: its `text` when non-empty,
/// else its decoded `value` as a string, or the object's `email`, or `text`.
/// A value that is not JSON is used verbatim.
#[must_use]
pub fn cell_text(text: Option<&str>, value: &Value) -> Option<String> {
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        return Some(text.to_string());
    }

    match parse_value(value) {
        ParsedValue::Text(decoded) => Some(decoded),
        ParsedValue::Object(map) => map
            .get("email")
            .and_then(Value::as_str)
            .or_else(|| map.get("text").and_then(Value::as_str))
            .map(str::to_string),
        ParsedValue::Opaque(raw) => Some(raw),
        ParsedValue::Other(_) | ParsedValue::Absent => None,
    }
}

/// Recompute every rollup column of `item` from its subitems.
///
/// Returns the number of rollup columns recomputed.
pub fn aggregate_rollups(item: &mut NormalizedItem) -> usize {
    let NormalizedItem {
        column_values,
        mappable_column_values,
        subitems,
        ..
    } = item;

    let mut recomputed = 0;
    for cv in column_values.iter_mut() {
        let Some(meta) = relation_of(cv, RelationKind::Rollup) else {
            continue;
        };
        let Some(target) = meta.target() else {
            debug!(column = %cv.id, "rollup column has no target column, skipping");
            continue;
        };

        let mut tally = Tally::default();
        for subitem in subitems.iter() {
            let Some(cell) = subitem.column(target.column_id) else {
                trace!(column = %cv.id, subitem = %subitem.header.id, "subitem lacks target column");
                continue;
            };
            tally.push(cell_text(cell.text.as_deref(), &cell.value));
        }

        cv.text = tally.joined_text();
        if let Some(sum) = tally.encoded_sum() {
            cv.value = sum;
        }
        refresh_mappable(mappable_column_values, cv);
        recomputed += 1;
    }
    recomputed
}

/// Recompute every cross-board relation column of `item` from the resolved index.
///
/// Returns the number of cross-board columns recomputed.
pub fn aggregate_cross_board(item: &mut NormalizedItem, index: &LinkedItemIndex) -> usize {
    let NormalizedItem {
        column_values,
        mappable_column_values,
        ..
    } = item;

    // Narrowing reads sibling columns' references as they were before any
    // column of this item was rewritten.
    let mut references: HashMap<String, Vec<String>> = HashMap::new();
    for cv in column_values.iter() {
        references
            .entry(cv.id.clone())
            .or_insert_with(|| column_references(cv));
    }

    let mut recomputed = 0;
    for cv in column_values.iter_mut() {
        let Some(meta) = relation_of(cv, RelationKind::CrossBoard) else {
            continue;
        };

        backfill_display_text(cv, index);

        if let Some(target) = meta.target() {
            let mut tally = Tally::default();
            for id in candidate_ids(&meta, &references, index) {
                let Some(linked) = index.get(&id) else {
                    continue;
                };
                if linked.board_id() != target.board_id {
                    trace!(column = %cv.id, linked = %id, board = linked.board_id(), "linked item on another board");
                    continue;
                }
                let Some(cell) = linked.column(target.column_id) else {
                    continue;
                };
                tally.push(cell_text(cell.text.as_deref(), &cell.value));
            }

            if let Some(text) = tally.joined_text() {
                cv.text = Some(text);
            }
            if let Some(sum) = tally.encoded_sum() {
                cv.value = sum;
            }
            recomputed += 1;
        } else {
            debug!(column = %cv.id, "cross-board column has no target column, skipping");
        }

        refresh_mappable(mappable_column_values, cv);
    }
    recomputed
}

/// Fill an empty `text` on a column with linked ids: `display_value` when it
/// is not blank, else the linked items' names. `value` is never touched.
pub fn backfill_display_text(cv: &mut ColumnValue, index: &LinkedItemIndex) {
    if cv.text.as_deref().is_some_and(|t| !t.is_empty()) {
        return;
    }
    let Some(ids) = cv.linked_item_ids.as_ref().filter(|ids| !ids.is_empty()) else {
        return;
    };

    if let Some(display) = cv.display_value.as_deref().filter(|d| !d.trim().is_empty()) {
        cv.text = Some(display.to_string());
        return;
    }

    let names: Vec<&str> = ids
        .iter()
        .filter_map(|id| index.get(id))
        .filter_map(|linked| linked.name.as_deref())
        .filter(|name| !name.is_empty())
        .collect();
    if !names.is_empty() {
        cv.text = Some(names.join(TEXT_SEPARATOR));
    }
}

/// Candidate ids for a cross-board column: the deduplicated references of
/// flagged sibling columns, or every indexed id when none are flagged or the
/// flagged columns reference nothing.
fn candidate_ids(
    meta: &RelationMetadata,
    references: &HashMap<String, Vec<String>>,
    index: &LinkedItemIndex,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let specific: Vec<String> = meta
        .flagged_columns()
        .filter_map(|column_id| references.get(column_id))
        .flatten()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    if specific.is_empty() {
        index.ids().map(str::to_string).collect()
    } else {
        specific
    }
}

fn relation_of(cv: &ColumnValue, kind: RelationKind) -> Option<RelationMetadata> {
    parse_relation_metadata(cv.additional_info.as_deref()).filter(|meta| meta.kind == kind)
}

fn refresh_mappable(mappables: &mut MappableColumnValues, cv: &ColumnValue) {
    if let Some(entry) = mappables.get_mut(&cv.id) {
        entry.refresh_text(cv.text.as_deref());
    }
}
