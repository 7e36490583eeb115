//! Crate-level error type
//!
//! Per-source failures stay typed as [`ScrapeError`] inside the pipeline,
//! where they become job outcomes. [`Error`] is what escapes to the command
//! layer: bad flags or configuration, the companies file, output writing and
//! store setup. `main` reports its [`ErrorCategory`] with a hint and exit code.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use crate::utils::error::{FetchError, ParseError, ScrapeError};

/// Coarse grouping used when reporting an error to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Flags, config file or environment
    Config,
    /// The companies list
    Input,
    /// Database or output files
    Storage,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Input => "input",
            Self::Storage => "storage",
            Self::Other => "other",
        }
    }

    /// What the operator should look at
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Config => "check --source values, the config file and PAYGRADE_* variables",
            Self::Input => "the companies file must be a JSON array of names",
            Self::Storage => "check the database and output paths are writable",
            Self::Other => "rerun with --verbose for details",
        }
    }

    /// Process exit code; usage-style errors get 2
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config | Self::Input => 2,
            Self::Storage | Self::Other => 1,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid companies file {}: {source}", path.display())]
    CompaniesFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// I/O failure tied to a file the operator named
    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Scrape(ScrapeError::Persistence(_)) | Self::File { .. } | Self::Json(_) => {
                ErrorCategory::Storage
            }
            Self::Scrape(ScrapeError::UnknownSource(_)) | Self::Config(_) => ErrorCategory::Config,
            Self::CompaniesFile { .. } => ErrorCategory::Input,
            Self::Scrape(_) | Self::Other(_) => ErrorCategory::Other,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
