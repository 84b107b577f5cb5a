//! Relation metadata parsing from a column's settings blob.
//!
//! A relation column's settings look like:
//!
//! ```json
//! {"relation_column": {"subelementos": true},
//!  "displayed_linked_columns": {"B2": ["n_meros_1__1"]}}
//! ```
//!
//! `relation_column` decides the kind: a truthy `subelementos` key is a
//! rollup over the item's own subitems; any other key makes it a cross-board
//! relation. Only the first board in `displayed_linked_columns`, and the
//! first column listed for it, are ever aggregated.

use serde_json::{Map, Value};
use tracing::trace;

use crate::de::coerce_id;

/// Key inside `relation_column` that marks a subitem rollup.
pub const ROLLUP_KEY: &str = "subelementos";

/// How a relation column finds its source records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Aggregates over the item's nested subitems.
    Rollup,
    /// Aggregates over items on another board, resolved by id.
    CrossBoard,
}

impl RelationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rollup => "rollup",
            Self::CrossBoard => "cross-board",
        }
    }
}

/// Relation intent parsed from a settings blob.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationMetadata {
    pub kind: RelationKind,
    /// The raw `relation_column` map.
    pub relation: Map<String, Value>,
    /// Target board id -> target column ids, in settings order.
    pub displayed_linked_columns: Vec<(String, Vec<String>)>,
}

/// The single board/column pair a relation column aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationTarget<'a> {
    pub board_id: &'a str,
    pub column_id: &'a str,
}

impl RelationMetadata {
    /// First target board and its first target column, if both exist.
    #[must_use]
    pub fn target(&self) -> Option<RelationTarget<'_>> {
        let (board_id, columns) = self.displayed_linked_columns.first()?;
        let column_id = columns.first()?;
        Some(RelationTarget {
            board_id: board_id.as_str(),
            column_id: column_id.as_str(),
        })
    }

    /// Column ids flagged with a literal `true` in `relation_column`.
    pub fn flagged_columns(&self) -> impl Iterator<Item = &str> {
        self.relation
            .iter()
            .filter(|(_, flag)| matches!(flag, Value::Bool(true)))
            .map(|(column_id, _)| column_id.as_str())
    }
}

/// Parse a settings blob into relation metadata.
///
/// Returns `None`, never an error, when the blob is missing, is not a JSON
/// object, has no `displayed_linked_columns` object, or describes no
/// relation. Such columns are left untouched by aggregation.
#[must_use]
pub fn parse_relation_metadata(settings: Option<&str>) -> Option<RelationMetadata> {
    let settings = settings?;
    let parsed: Value = match serde_json::from_str(settings) {
        Ok(value) => value,
        Err(err) => {
            trace!(error = %err, "column settings are not JSON");
            return None;
        }
    };
    let Value::Object(mut root) = parsed else {
        return None;
    };

    let Some(Value::Object(dlc)) = root.remove("displayed_linked_columns") else {
        return None;
    };

    let relation = match root.remove("relation_column") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let kind = if relation.get(ROLLUP_KEY).is_some_and(is_truthy) {
        RelationKind::Rollup
    } else if relation.keys().any(|key| key != ROLLUP_KEY) {
        RelationKind::CrossBoard
    } else {
        return None;
    };

    let displayed_linked_columns = dlc
        .into_iter()
        .map(|(board_id, columns)| {
            let columns = match columns {
                Value::Array(entries) => entries.iter().filter_map(coerce_id).collect(),
                _ => Vec::new(),
            };
            (board_id, columns)
        })
        .collect();

    Some(RelationMetadata {
        kind,
        relation,
        displayed_linked_columns,
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
