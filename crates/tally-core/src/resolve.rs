//! Linked item resolution: one batched fetch, one read-only index.

use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;

use tracing::{debug, info};

use crate::model::LinkedItem;

/// The single outbound operation the engine needs: fetch items by id.
///
/// Implementations own transport, auth, timeouts and retries. Their error
/// type reaches the caller unchanged.
pub trait LinkedItemFetcher {
    type Error;

    /// Fetch the items with the given ids. Unknown ids may simply be absent
    /// from the result.
    ///
    /// # Errors
    ///
    /// Returns the implementation's transport or decoding error.
    fn fetch_items_by_ids(&self, ids: &[String]) -> Result<Vec<LinkedItem>, Self::Error>;
}

impl<F: LinkedItemFetcher + ?Sized> LinkedItemFetcher for &F {
    type Error = F::Error;

    fn fetch_items_by_ids(&self, ids: &[String]) -> Result<Vec<LinkedItem>, Self::Error> {
        (**self).fetch_items_by_ids(ids)
    }
}

/// Id -> linked item, in fetch-response order.
///
/// Built once per batch and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkedItemIndex {
    items: Vec<LinkedItem>,
    positions: HashMap<String, usize>,
}

impl LinkedItemIndex {
    /// Index items by id. A repeated id keeps its first position and the
    /// last item seen. Items without an id are dropped.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = LinkedItem>) -> Self {
        let mut index = Self::default();
        for item in items {
            if item.id.is_empty() {
                continue;
            }
            if let Some(&pos) = index.positions.get(&item.id) {
                index.items[pos] = item;
            } else {
                index.positions.insert(item.id.clone(), index.items.len());
                index.items.push(item);
            }
        }
        index
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LinkedItem> {
        self.positions.get(id).map(|&pos| &self.items[pos])
    }

    /// Indexed ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.id.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<LinkedItem> for LinkedItemIndex {
    fn from_iter<I: IntoIterator<Item = LinkedItem>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}

/// Resolve a set of foreign ids with at most one fetch.
///
/// An empty id set returns an empty index without calling the fetcher.
///
/// # Errors
///
/// Propagates the fetcher's error as-is.
pub fn resolve_linked_items<F>(
    ids: &BTreeSet<String>,
    fetcher: &F,
) -> Result<LinkedItemIndex, F::Error>
where
    F: LinkedItemFetcher + ?Sized,
{
    if ids.is_empty() {
        debug!("no linked ids referenced, skipping fetch");
        return Ok(LinkedItemIndex::default());
    }

    let request: Vec<String> = ids.iter().cloned().collect();
    let fetched = fetcher.fetch_items_by_ids(&request)?;
    let index = LinkedItemIndex::from_items(fetched);
    info!(
        requested = request.len(),
        resolved = index.len(),
        "resolved linked items"
    );
    Ok(index)
}

/// A fetcher over a fixed, pre-loaded set of items.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFetcher {
    items: Vec<LinkedItem>,
}

impl InMemoryFetcher {
    #[must_use]
    pub const fn new(items: Vec<LinkedItem>) -> Self {
        Self { items }
    }
}

impl LinkedItemFetcher for InMemoryFetcher {
    type Error = Infallible;

    fn fetch_items_by_ids(&self, ids: &[String]) -> Result<Vec<LinkedItem>, Self::Error> {
        Ok(self
            .items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect())
    }
}
