//! Error types for the paygrade pipeline
//!
//! This module defines the per-source error taxonomy. Each kind maps to
//! exactly one [`ErrorPolicy`].

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error (connection, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Status(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Errors that can occur while extracting or normalizing embedded data
#[derive(Error, Debug)]
pub enum ParseError {
    /// The embedded data block is not on the page
    #[error("No {marker} found")]
    NoDataFound { marker: String },

    /// The block exists but its content does not have the expected shape
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String, snippet: String },
}

impl ParseError {
    pub fn malformed(reason: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
            snippet: snippet.into(),
        }
    }
}

/// How the orchestrator reacts to a failed (company, source) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Record the job as failed and move on to the next source
    SkipSource,
    /// Programmer error: fail the call without touching the job log
    Fatal,
}

/// Coarse kind of a scrape failure, kept in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeErrorKind {
    UnknownSource,
    Fetch,
    NoDataFound,
    MalformedPayload,
    Persistence,
}

/// Everything that can go wrong for one (company, source) pair
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Source tag is not registered
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Network, timeout or non-2xx failure
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Extraction or normalization failure
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Failure bubbled up from the store
    #[error("Persistence error: {0:#}")]
    Persistence(anyhow::Error),
}

impl ScrapeError {
    pub fn kind(&self) -> ScrapeErrorKind {
        match self {
            Self::UnknownSource(_) => ScrapeErrorKind::UnknownSource,
            Self::Fetch(_) => ScrapeErrorKind::Fetch,
            Self::Parse(ParseError::NoDataFound { .. }) => ScrapeErrorKind::NoDataFound,
            Self::Parse(ParseError::MalformedPayload { .. }) => ScrapeErrorKind::MalformedPayload,
            Self::Persistence(_) => ScrapeErrorKind::Persistence,
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        match self.kind() {
            ScrapeErrorKind::UnknownSource => ErrorPolicy::Fatal,
            ScrapeErrorKind::Fetch
            | ScrapeErrorKind::NoDataFound
            | ScrapeErrorKind::MalformedPayload
            | ScrapeErrorKind::Persistence => ErrorPolicy::SkipSource,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
