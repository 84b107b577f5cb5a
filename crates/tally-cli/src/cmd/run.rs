//! `tl run`: the full two-phase pipeline over a batch of items.
//!
//! Linked items come from, in order: `--linked FILE`, `--endpoint URL`,
//! `fetch.linked_items` or `fetch.endpoint` in `.tally/config.toml`. With no
//! source, cross-board columns are aggregated against an empty index.

use crate::fetch::{HttpFetcher, load_linked_file};
use crate::output::{OutputMode, render_list};
use crate::source::{self, STDIN};
use clap::Args;
use std::path::{Path, PathBuf};
use tally_core::config::FetchConfig;
use tally_core::{InMemoryFetcher, NormalizedBatch};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input document: an item array, `{"items": [...]}`, or a raw query response. `-` reads stdin.
    #[arg(default_value = STDIN)]
    pub input: String,

    /// File of pre-fetched linked items (same envelopes as the input).
    #[arg(long, value_name = "FILE", conflicts_with = "endpoint")]
    pub linked: Option<PathBuf>,

    /// Items API endpoint to fetch linked items from.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,
}

/// Where linked items are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkedSource {
    File(PathBuf),
    Endpoint(String),
    Unresolved,
}

/// Flags beat config; a file beats an endpoint at the same level.
fn select_source(args: &RunArgs, config: &FetchConfig, project_root: &Path) -> LinkedSource {
    if let Some(path) = &args.linked {
        return LinkedSource::File(path.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        return LinkedSource::Endpoint(endpoint.clone());
    }
    if let Some(path) = &config.linked_items {
        return LinkedSource::File(project_root.join(path));
    }
    if let Some(endpoint) = &config.endpoint {
        return LinkedSource::Endpoint(endpoint.clone());
    }
    LinkedSource::Unresolved
}

/// Execute `tl run [INPUT]`.
///
/// # Errors
///
/// Returns an error if the input cannot be read, the linked item source
/// fails, or output rendering fails. Nothing is printed on a fetch failure.
pub fn run_run(
    args: &RunArgs,
    output: OutputMode,
    config: &FetchConfig,
    project_root: &Path,
) -> anyhow::Result<()> {
    let raw = source::read_items(&args.input)?;
    let batch = NormalizedBatch::from_raw(raw);

    let items = match select_source(args, config, project_root) {
        LinkedSource::File(path) => {
            let fetcher = load_linked_file(&path)?;
            batch.aggregate(&fetcher)?
        }
        LinkedSource::Endpoint(endpoint) => {
            let fetcher = HttpFetcher::from_config(endpoint, config);
            batch.aggregate(&fetcher)?
        }
        LinkedSource::Unresolved => {
            let pending = batch.linked_ids().len();
            if pending > 0 {
                warn!(
                    linked = pending,
                    "no linked item source configured; pass --linked or --endpoint"
                );
            }
            batch.aggregate(&InMemoryFetcher::default())?
        }
    };

    info!(items = items.len(), "batch complete");
    render_list(&items, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(linked: Option<&str>, endpoint: Option<&str>) -> RunArgs {
        RunArgs {
            input: STDIN.to_string(),
            linked: linked.map(PathBuf::from),
            endpoint: endpoint.map(str::to_string),
        }
    }

    #[test]
    fn flags_override_config() {
        let config = FetchConfig {
            endpoint: Some("https://configured.example".into()),
            linked_items: Some(PathBuf::from("linked.json")),
            ..FetchConfig::default()
        };
        let root = Path::new("/project");

        assert_eq!(
            select_source(&args(Some("other.json"), None), &config, root),
            LinkedSource::File(PathBuf::from("other.json"))
        );
        assert_eq!(
            select_source(&args(None, Some("https://flag.example")), &config, root),
            LinkedSource::Endpoint("https://flag.example".into())
        );
        assert_eq!(
            select_source(&args(None, None), &config, root),
            LinkedSource::File(PathBuf::from("/project/linked.json"))
        );
    }

    #[test]
    fn configured_endpoint_and_nothing() {
        let root = Path::new("/project");
        let config = FetchConfig {
            endpoint: Some("https://configured.example".into()),
            ..FetchConfig::default()
        };
        assert_eq!(
            select_source(&args(None, None), &config, root),
            LinkedSource::Endpoint("https://configured.example".into())
        );
        assert_eq!(
            select_source(&args(None, None), &FetchConfig::default(), root),
            LinkedSource::Unresolved
        );
    }
}
