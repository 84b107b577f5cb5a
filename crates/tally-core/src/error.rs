use std::fmt;

use crate::input::InputError;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InputUnreadable,
    InputMalformed,
    QueryRejected,
    LinkedSourceMissing,
    FetchFailed,
    FetchRejected,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InputUnreadable => "E2001",
            Self::InputMalformed => "E2002",
            Self::QueryRejected => "E2003",
            Self::LinkedSourceMissing => "E3001",
            Self::FetchFailed => "E3002",
            Self::FetchRejected => "E3003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .tally/config.toml and retry."),
            Self::InputUnreadable => Some("Check the input path, or pipe the document on stdin."),
            Self::InputMalformed => Some(
                "Pass an item array, an object with `items`, or a raw query response with `data`.",
            ),
            Self::QueryRejected => {
                Some("Inspect the `errors` array in the input; the query itself failed.")
            }
            Self::LinkedSourceMissing => {
                Some("Check the --linked path or the fetch.linked_items config entry.")
            }
            Self::FetchFailed => Some("Check the endpoint, network access and API token."),
            Self::FetchRejected => {
                Some("The API answered with errors; verify the token's permissions.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl InputError {
    /// The error code this input failure maps to.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Query(_) => ErrorCode::QueryRejected,
            Self::Json(_) | Self::NoItems | Self::Item { .. } => ErrorCode::InputMalformed,
        }
    }
}
