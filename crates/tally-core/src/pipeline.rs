//! Two-phase batch pipeline.
//!
//! Phase one ([`NormalizedBatch::from_raw`]) normalizes each item on its own
//! and applies rollups. Phase two ([`NormalizedBatch::aggregate`]) runs, in
//! this order: linked-reference collection over the whole batch, one
//! resolution fetch, then cross-board aggregation per item. A
//! [`NormalizedBatch`] can only leave phase one through phase two (or through
//! the explicit [`NormalizedBatch::into_unresolved`] escape hatch).

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::aggregate::aggregate_cross_board;
use crate::collect::collect_linked_ids;
use crate::model::{NormalizedItem, RawItem};
use crate::normalize::normalize;
use crate::resolve::{LinkedItemFetcher, LinkedItemIndex, resolve_linked_items};

/// Normalized items that still await cross-board aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "a normalized batch does nothing until it is aggregated"]
pub struct NormalizedBatch {
    items: Vec<NormalizedItem>,
}

impl NormalizedBatch {
    /// Run phase one over raw items.
    pub fn from_raw(raw: impl IntoIterator<Item = RawItem>) -> Self {
        raw.into_iter().map(normalize).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Foreign ids the batch references; what [`Self::aggregate`] will fetch.
    #[must_use]
    pub fn linked_ids(&self) -> BTreeSet<String> {
        collect_linked_ids(&self.items)
    }

    /// Run phase two: collect, resolve with exactly one fetch (none if
    /// nothing is referenced), and aggregate cross-board columns.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error unchanged. No item is aggregated in that case.
    pub fn aggregate<F>(self, fetcher: &F) -> Result<Vec<NormalizedItem>, F::Error>
    where
        F: LinkedItemFetcher + ?Sized,
    {
        let ids = self.linked_ids();
        debug!(items = self.items.len(), linked = ids.len(), "collected linked ids");
        let index = resolve_linked_items(&ids, fetcher)?;
        Ok(self.aggregate_with(&index))
    }

    /// Run cross-board aggregation against an index the caller already resolved.
    #[must_use]
    pub fn aggregate_with(self, index: &LinkedItemIndex) -> Vec<NormalizedItem> {
        let mut items = self.items;
        let mut columns = 0;
        for item in &mut items {
            columns += aggregate_cross_board(item, index);
        }
        info!(
            items = items.len(),
            linked = index.len(),
            columns,
            "aggregated cross-board relations"
        );
        items
    }

    /// Leave the pipeline after phase one, without cross-board aggregation.
    #[must_use]
    pub fn into_unresolved(self) -> Vec<NormalizedItem> {
        self.items
    }
}

impl FromIterator<NormalizedItem> for NormalizedBatch {
    fn from_iter<I: IntoIterator<Item = NormalizedItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<NormalizedItem>> for NormalizedBatch {
    fn from(items: Vec<NormalizedItem>) -> Self {
        Self { items }
    }
}

/// Phase two over items normalized with [`normalize`].
///
/// # Errors
///
/// Returns the fetcher's error unchanged.
pub fn aggregate_batch<F>(
    items: Vec<NormalizedItem>,
    fetcher: &F,
) -> Result<Vec<NormalizedItem>, F::Error>
where
    F: LinkedItemFetcher + ?Sized,
{
    NormalizedBatch::from(items).aggregate(fetcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkedItem;
    use crate::resolve::InMemoryFetcher;
    use serde_json::json;

    struct Unreachable;

    impl LinkedItemFetcher for Unreachable {
        type Error = &'static str;

        fn fetch_items_by_ids(&self, _ids: &[String]) -> Result<Vec<LinkedItem>, Self::Error> {
            Err("fetch should not happen")
        }
    }

    fn raw(value: serde_json::Value) -> RawItem {
        serde_json::from_value(value).expect("raw item should deserialize")
    }

    #[test]
    fn from_raw_keeps_one_item_per_record() {
        assert!(NormalizedBatch::default().is_empty());
        let batch = NormalizedBatch::from_raw(vec![raw(json!({"id": "1"})), raw(json!({"id": "2"}))]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
    }

    #[test]
    fn batch_without_references_skips_fetch() {
        let batch = NormalizedBatch::from_raw(vec![raw(json!({"id": "1"}))]);
        let items = batch.aggregate(&Unreachable).expect("no fetch expected");
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn fetch_failure_surfaces_to_caller() {
        let batch = NormalizedBatch::from_raw(vec![raw(json!({
            "id": "1",
            "column_values": [{"id": "link", "linked_item_ids": ["7"]}]
        }))]);
        let err = batch.aggregate(&Unreachable).expect_err("fetch should fail");
        assert_eq!(err, "fetch should not happen");
    }

    #[test]
    fn aggregate_batch_matches_pipeline() {
        let item = normalize(raw(json!({
            "id": "1",
            "column_values": [{
                "id": "link",
                "linked_item_ids": ["42"],
                "column": {"settings_str":
                    "{\"relation_column\":{\"link\":true},\"displayed_linked_columns\":{\"999\":[\"price\"]}}"}
            }]
        })));
        let fetcher = InMemoryFetcher::new(vec![
            serde_json::from_value(json!({
                "id": "42", "name": "Linked", "board": {"id": "999"},
                "column_values": [{"id": "price", "text": "10", "value": "\"10\""}]
            }))
            .expect("linked item"),
        ]);

        let Ok(items) = aggregate_batch(vec![item], &fetcher);
        assert_eq!(items[0].column_values[0].text.as_deref(), Some("10"));
        assert_eq!(items[0].column_values[0].value, json!("\"10\""));
    }
}
