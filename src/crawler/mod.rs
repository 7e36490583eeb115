//! Scraping: source registry, fetching, freshness gating and job tracking
//!
//! [`pipeline::SalaryPipeline`] ties the pieces together; the other modules
//! are usable on their own.

pub mod fetcher;
pub mod freshness;
pub mod job;
pub mod pipeline;
pub mod sources;

pub use fetcher::PageFetcher;
pub use freshness::FreshnessGate;
pub use job::{ActiveJob, JobRecorder};
pub use pipeline::{
    CompanyReport, PipelineConfig, RunReport, RunSummary, SalaryPipeline, SourceOutcome,
};
pub use sources::{company_slug, SourceRegistry};
