//! paygrade - Salary data ingestion pipeline
//!
//! Collects compensation observations for a list of companies from public
//! salary sites, normalizes them into one canonical record shape and persists
//! them, re-fetching a (company, source) pair only once its last successful
//! scrape has gone stale.
//!
//! # Architecture
//!
//! - [`config`] - Layered configuration (defaults, TOML, environment)
//! - [`crawler`] - Source registry, fetcher, freshness gate, job recorder, pipeline
//! - [`parser`] - Embedded payload extraction and per-source normalization
//! - [`models`] - Companies, sources, scrape jobs and salary records
//! - [`storage`] - SQLite and in-memory stores, JSON input/output
//! - [`error`] - Unified error type and the scrape error taxonomy
//! - [`utils`] - Text helpers and retry with backoff
//!
//! # Example
//!
//! ```no_run
//! use paygrade::config::Config;
//! use paygrade::crawler::SalaryPipeline;
//! use paygrade::storage::open_store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = open_store(&config.database.sqlite_path, false)?;
//!     let pipeline = SalaryPipeline::new(&config, store)?;
//!
//!     let report = pipeline.run(&["Google".to_string()]).await;
//!     println!("{} records", report.summary.records);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod parser;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{CompanyReport, RunSummary, SalaryPipeline, SourceOutcome};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{CompensationBreakdown, JobStatus, SalaryRecord, ScrapeJob, Source};
    pub use crate::storage::{SalaryStore, SharedSalaryStore};
}

// Direct re-exports for convenience
pub use models::{CompensationBreakdown, SalaryRecord, Source};
