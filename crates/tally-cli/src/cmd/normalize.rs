//! `tl normalize`: per-item normalization only, no linked item resolution.

use crate::output::{OutputMode, render_list};
use crate::source::{self, STDIN};
use clap::Args;
use tally_core::NormalizedBatch;
use tracing::info;

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Input document: an item array, `{"items": [...]}`, or a raw query response. `-` reads stdin.
    #[arg(default_value = STDIN)]
    pub input: String,
}

/// Execute `tl normalize [INPUT]`.
///
/// Rollup columns are recomputed; cross-board columns keep their API values.
///
/// # Errors
///
/// Returns an error if the input cannot be read or parsed, or output fails.
pub fn run_normalize(args: &NormalizeArgs, output: OutputMode) -> anyhow::Result<()> {
    let raw = source::read_items(&args.input)?;
    let batch = NormalizedBatch::from_raw(raw);

    let pending = batch.linked_ids().len();
    if pending > 0 {
        info!(
            linked = pending,
            "cross-board columns left unresolved; use `tl run` to aggregate them"
        );
    }

    render_list(&batch.into_unresolved(), output)?;
    Ok(())
}
