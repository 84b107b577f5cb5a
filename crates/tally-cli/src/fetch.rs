//! Linked item sources for `tl run`: a pre-fetched file, or the items API.

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_core::config::FetchConfig;
use tally_core::model::LinkedItem;
use tally_core::{ErrorCode, InMemoryFetcher, InputError, LinkedItemFetcher, extract_linked_items, parse_linked_items};
use tracing::{debug, warn};

/// GraphQL query used to fetch linked items by id.
pub const ITEMS_BY_IDS_QUERY: &str =
    "query ($ids: [ID!]) { items(ids: $ids) { id name board { id } column_values { id text value } } }";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to read linked items from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("linked items in {} are malformed: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: InputError,
    },

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("{endpoint} answered with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("response from {endpoint} is not JSON: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("linked item query was rejected: {source}")]
    Rejected {
        #[source]
        source: InputError,
    },
}

impl FetchError {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Malformed { .. } => ErrorCode::LinkedSourceMissing,
            Self::Transport { .. } | Self::Decode { .. } => ErrorCode::FetchFailed,
            Self::Status { .. } | Self::Rejected { .. } => ErrorCode::FetchRejected,
        }
    }
}

/// Load a file of pre-fetched linked items into an in-memory fetcher.
///
/// The file may hold any envelope the item parser accepts, including a raw
/// `items(ids:)` query response.
///
/// # Errors
///
/// Returns [`FetchError::Read`] or [`FetchError::Malformed`].
pub fn load_linked_file(path: &Path) -> Result<InMemoryFetcher, FetchError> {
    let text = std::fs::read_to_string(path).map_err(|source| FetchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let items = parse_linked_items(&text).map_err(|source| FetchError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), items = items.len(), "loaded linked items file");
    Ok(InMemoryFetcher::new(items))
}

/// Fetches linked items from the items API over HTTP.
pub struct HttpFetcher {
    agent: ureq::Agent,
    endpoint: String,
    token: Option<String>,
}

impl HttpFetcher {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            endpoint: endpoint.into(),
            token,
        }
    }

    /// Build a fetcher for `endpoint`, reading the token from the env var named in `config`.
    pub fn from_config(endpoint: impl Into<String>, config: &FetchConfig) -> Self {
        let token = std::env::var(&config.token_env).ok().filter(|t| !t.is_empty());
        if token.is_none() {
            warn!(env = %config.token_env, "no API token set, sending unauthenticated request");
        }
        Self::new(endpoint, token, Duration::from_secs(config.timeout_secs))
    }

    fn request_body(ids: &[String]) -> Value {
        json!({
            "query": ITEMS_BY_IDS_QUERY,
            "variables": { "ids": ids },
        })
    }
}

impl LinkedItemFetcher for HttpFetcher {
    type Error = FetchError;

    fn fetch_items_by_ids(&self, ids: &[String]) -> Result<Vec<LinkedItem>, Self::Error> {
        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("User-Agent", "tally-cli");
        if let Some(token) = &self.token {
            request = request.set("Authorization", token);
        }

        let response = request
            .send_json(Self::request_body(ids))
            .map_err(|err| match err {
                ureq::Error::Status(status, _) => FetchError::Status {
                    endpoint: self.endpoint.clone(),
                    status,
                },
                other => FetchError::Transport {
                    endpoint: self.endpoint.clone(),
                    source: Box::new(other),
                },
            })?;

        let document: Value = response.into_json().map_err(|source| FetchError::Decode {
            endpoint: self.endpoint.clone(),
            source,
        })?;

        let items =
            extract_linked_items(document).map_err(|source| FetchError::Rejected { source })?;
        debug!(requested = ids.len(), returned = items.len(), "fetched linked items");
        Ok(items)
    }
}
