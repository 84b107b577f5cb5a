//! Raw and normalized record shapes.
//!
//! Raw types mirror what the query layer returns and are deserialized
//! leniently (see [`crate::de`]). Normalized types are the externally
//! observable output: their field names and nesting are a wire contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::de;

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// One work item as returned by the query layer.
///
/// Only the fields the engine reads are typed; everything else the item
/// carries through (`state`, `board`, `group`, timestamps, `assets`) stays
/// opaque JSON.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawItem {
    #[serde(default, deserialize_with = "de::id")]
    pub id: String,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Value,
    #[serde(default)]
    pub created_at: Value,
    #[serde(default)]
    pub updated_at: Value,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub board: Value,
    #[serde(default)]
    pub creator_id: Value,
    #[serde(default)]
    pub group: Value,
    #[serde(default, deserialize_with = "de::list_or_empty")]
    pub column_values: Vec<RawColumnValue>,
    #[serde(default, deserialize_with = "de::list_or_empty")]
    pub assets: Vec<Value>,
    #[serde(default, deserialize_with = "de::lenient")]
    pub parent_item: Option<Box<RawItem>>,
    #[serde(default, deserialize_with = "de::list_or_empty")]
    pub subitems: Vec<RawItem>,
}

/// One raw column entry on an item.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawColumnValue {
    #[serde(default, deserialize_with = "de::id")]
    pub id: String,
    /// Usually a JSON-encoded string whose shape depends on the column type.
    #[serde(default)]
    pub value: Value,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub display_value: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id_list")]
    pub linked_item_ids: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de::lenient")]
    pub column: Option<RawColumn>,
}

/// Column definition attached to a raw column entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawColumn {
    #[serde(default, deserialize_with = "de::opt_text")]
    pub title: Option<String>,
    /// JSON-encoded column settings (the settings blob).
    #[serde(default, deserialize_with = "de::opt_text")]
    pub settings_str: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalized output
// ---------------------------------------------------------------------------

/// A normalized column value.
///
/// `text` and `value` are the only fields rewritten after creation, and only
/// by relation aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnValue {
    pub id: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub display_value: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// The column's settings blob, verbatim.
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_item_ids: Option<Vec<String>>,
}

/// Per-column representation for programmatic consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappableValue {
    Object(Map<String, Value>),
    Text(String),
    Null,
    /// A decoded number, boolean or array.
    Json(Value),
}

impl MappableValue {
    /// Overwrite the `text` key of an object entry. Strings and nulls are left as-is.
    pub fn refresh_text(&mut self, text: Option<&str>) {
        if let Self::Object(map) = self {
            let text = text.map_or(Value::Null, |t| Value::String(t.to_string()));
            map.insert("text".to_string(), text);
        }
    }
}

/// Column id -> mappable value. Exactly one entry per column id.
pub type MappableColumnValues = BTreeMap<String, MappableValue>;

/// Identity and bookkeeping fields shared by items, subitems and parents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemHeader {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Value,
    #[serde(default)]
    pub updated_at: Value,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub board: Value,
    #[serde(default)]
    pub creator_id: Value,
    #[serde(default)]
    pub group: Value,
}

impl ItemHeader {
    #[must_use]
    pub fn from_raw(raw: &RawItem) -> Self {
        Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            created_at: raw.created_at.clone(),
            updated_at: raw.updated_at.clone(),
            state: raw.state.clone(),
            board: raw.board.clone(),
            creator_id: raw.creator_id.clone(),
            group: raw.group.clone(),
        }
    }
}

/// A top-level item after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    #[serde(flatten)]
    pub header: ItemHeader,
    #[serde(default)]
    pub email: Value,
    pub column_values: Vec<ColumnValue>,
    pub mappable_column_values: MappableColumnValues,
    #[serde(default)]
    pub assets: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_item: Option<NormalizedParent>,
    #[serde(default)]
    pub subitems: Vec<NormalizedSubitem>,
}

impl NormalizedItem {
    #[must_use]
    pub fn column(&self, column_id: &str) -> Option<&ColumnValue> {
        self.column_values.iter().find(|cv| cv.id == column_id)
    }
}

/// A subitem: mapped columns and mappables, never aggregated itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSubitem {
    #[serde(flatten)]
    pub header: ItemHeader,
    pub column_values: Vec<ColumnValue>,
    pub mappable_column_values: MappableColumnValues,
}

impl NormalizedSubitem {
    #[must_use]
    pub fn column(&self, column_id: &str) -> Option<&ColumnValue> {
        self.column_values.iter().find(|cv| cv.id == column_id)
    }
}

/// The parent of a subitem, one level deep: fields and mapped columns only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedParent {
    #[serde(flatten)]
    pub header: ItemHeader,
    pub column_values: Vec<ColumnValue>,
}

// ---------------------------------------------------------------------------
// Linked items (fetch collaborator output)
// ---------------------------------------------------------------------------

/// Minimal shape of an item fetched by id for cross-board aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedItem {
    #[serde(default, deserialize_with = "de::id")]
    pub id: String,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::lenient")]
    pub board: Option<BoardRef>,
    #[serde(default, deserialize_with = "de::list_or_empty")]
    pub column_values: Vec<LinkedColumnValue>,
}

impl LinkedItem {
    /// The item's board id, string-coerced; empty when unknown.
    #[must_use]
    pub fn board_id(&self) -> &str {
        self.board.as_ref().map_or("", |b| b.id.as_str())
    }

    #[must_use]
    pub fn column(&self, column_id: &str) -> Option<&LinkedColumnValue> {
        self.column_values.iter().find(|cv| cv.id == column_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRef {
    #[serde(default, deserialize_with = "de::id")]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedColumnValue {
    #[serde(default, deserialize_with = "de::id")]
    pub id: String,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub text: Option<String>,
    #[serde(default)]
    pub value: Value,
}
