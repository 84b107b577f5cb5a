//! Reading input documents from a file path or stdin (`-`).

use anyhow::Context;
use std::io::{self, Read};
use tally_core::model::RawItem;
use tally_core::{ErrorCode, parse_items};
use tracing::debug;

/// Path argument that means "read stdin".
pub const STDIN: &str = "-";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::InputUnreadable,
        }
    }
}

/// Human label for an input argument.
pub fn origin(input: &str) -> String {
    if input == STDIN {
        "stdin".to_string()
    } else {
        input.to_string()
    }
}

/// Read a whole document from `input`.
///
/// # Errors
///
/// Returns [`SourceError::Read`] if the file or stdin cannot be read.
pub fn read_document(input: &str) -> Result<String, SourceError> {
    let read_err = |source| SourceError::Read {
        origin: origin(input),
        source,
    };

    if input == STDIN {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(read_err)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).map_err(read_err)
    }
}

/// Read and parse raw items from `input`.
///
/// # Errors
///
/// Fails if the input cannot be read or holds no recognizable items.
pub fn read_items(input: &str) -> anyhow::Result<Vec<RawItem>> {
    let text = read_document(input)?;
    let items =
        parse_items(&text).with_context(|| format!("reading items from {}", origin(input)))?;
    debug!(input = %origin(input), items = items.len(), "parsed input items");
    Ok(items)
}
