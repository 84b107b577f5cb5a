//! tally-core library.
//!
//! Normalizes board item records (column values, parent, subitems) and
//! recomputes relation columns: rollups from subitems, and cross-board
//! mirrors from linked items fetched once per batch.

pub mod aggregate;
pub mod collect;
pub mod column;
pub mod config;
pub mod de;
pub mod error;
pub mod input;
pub mod model;
pub mod normalize;
pub mod numeric;
pub mod pipeline;
pub mod relation;
pub mod resolve;

// Conventions
//
// - Errors: typed `thiserror` enums at the seams, `anyhow::Result` for config loading.
// - Logging: `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub use error::ErrorCode;
pub use input::{InputError, extract_items, extract_linked_items, parse_items, parse_linked_items};
pub use model::{ColumnValue, LinkedItem, MappableValue, NormalizedItem, RawItem};
pub use normalize::normalize;
pub use pipeline::{NormalizedBatch, aggregate_batch};
pub use resolve::{InMemoryFetcher, LinkedItemFetcher, LinkedItemIndex};
