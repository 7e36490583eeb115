//! Salary ingestion pipeline
//!
//! Drives each company through every configured source:
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────┐   ┌─────────┐   ┌───────────┐   ┌────────┐
//! │ Company  │──▶│ Freshness │──▶│  Job    │──▶│ Fetcher │──▶│ Extractor │──▶│ Store  │
//! │ resolve  │   │   Gate    │   │ start   │   │         │   │ Normalizer│   │ insert │
//! └──────────┘   └───────────┘   └─────────┘   └─────────┘   └───────────┘   └────────┘
//!                     │ fresh                                                     │
//!                     └──▶ Skipped                                  Job complete ◀┘
//! ```
//!
//! Companies run concurrently up to `max_concurrent_companies`; sources within
//! a company run sequentially. A failed source never stops the next one.
//!
//! # Example
//!
//! ```no_run
//! use paygrade::config::Config;
//! use paygrade::crawler::pipeline::SalaryPipeline;
//! use paygrade::storage::repository::create_memory_store;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let pipeline = SalaryPipeline::new(&config, create_memory_store())?;
//!
//! let report = pipeline.run(&["Google".to_string()]).await;
//! println!("Persisted {} records", report.summary.records);
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::config::{Config, ScraperConfig};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::freshness::FreshnessGate;
use crate::crawler::job::JobRecorder;
use crate::crawler::sources::{SourceRegistry, DEFAULT_REGION, NEXT_DATA_MARKER};
use crate::models::{CompanyId, JobId, ParserVariant, SalaryRecord, Source};
use crate::parser::{extract_embedded, normalize, NormalizeContext};
use crate::storage::repository::SharedSalaryStore;
use crate::utils::error::{ErrorPolicy, FetchError, ParseError, ScrapeError, ScrapeErrorKind};
use crate::utils::retry::RetryConfig;

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sources tried for every company, in order
    pub sources: Vec<Source>,

    /// Recency threshold for the freshness gate
    pub freshness_hours: u32,

    /// Per-request fetch timeout
    pub request_timeout: Duration,

    /// Requests per second limit
    pub requests_per_second: u32,

    /// Companies in flight at once
    pub max_concurrent_companies: usize,

    /// Retry policy for recoverable fetch failures
    pub retry: RetryConfig,

    /// Fixed User-Agent
    pub user_agent: Option<String>,

    /// Region used when a source does not report a location
    pub region: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&ScraperConfig::default())
    }
}

impl From<&ScraperConfig> for PipelineConfig {
    fn from(scraper: &ScraperConfig) -> Self {
        Self {
            sources: scraper.sources.clone(),
            freshness_hours: scraper.freshness_hours,
            request_timeout: scraper.request_timeout(),
            requests_per_second: scraper.requests_per_second,
            max_concurrent_companies: scraper.max_concurrent_companies.max(1),
            retry: RetryConfig::new(scraper.fetch_retries),
            user_agent: scraper.user_agent.clone(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// What happened to one (company, source) pair
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    /// Fresh enough; no job, no network call
    Skipped,
    /// Job completed as success
    Scraped {
        job_id: JobId,
        records: Vec<SalaryRecord>,
    },
    /// Job completed as failed, or never started for fatal errors
    Failed {
        job_id: Option<JobId>,
        kind: ScrapeErrorKind,
        message: String,
    },
}

impl SourceOutcome {
    fn failed(job_id: Option<JobId>, error: &ScrapeError) -> Self {
        Self::Failed {
            job_id,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Records persisted for this pair
    pub fn record_count(&self) -> usize {
        match self {
            Self::Scraped { records, .. } => records.len(),
            Self::Skipped | Self::Failed { .. } => 0,
        }
    }

    pub fn records(&self) -> &[SalaryRecord] {
        match self {
            Self::Scraped { records, .. } => records,
            Self::Skipped | Self::Failed { .. } => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-company result
#[derive(Debug, Clone)]
pub struct CompanyReport {
    pub company: String,
    pub company_id: Option<CompanyId>,

    /// Set when the company could not be resolved; no source was attempted
    pub error: Option<String>,

    /// One entry per configured source, in configured order
    pub outcomes: Vec<(Source, SourceOutcome)>,
}

impl CompanyReport {
    fn unresolved(company: &str, error: &anyhow::Error) -> Self {
        Self {
            company: company.to_string(),
            company_id: None,
            error: Some(format!("{error:#}")),
            outcomes: Vec::new(),
        }
    }

    pub fn outcome(&self, source: Source) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, outcome)| outcome)
    }

    /// Source name to persisted record count
    pub fn counts(&self) -> std::collections::BTreeMap<&'static str, usize> {
        self.outcomes
            .iter()
            .map(|(source, outcome)| (source.as_str(), outcome.record_count()))
            .collect()
    }

    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|(_, o)| o.record_count()).sum()
    }
}

/// Aggregate totals for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub companies: usize,
    pub company_errors: usize,
    pub sources_scraped: usize,
    pub sources_skipped: usize,
    pub sources_failed: usize,
    pub records: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[CompanyReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            summary.companies += 1;
            if report.error.is_some() {
                summary.company_errors += 1;
            }
            for (_, outcome) in &report.outcomes {
                match outcome {
                    SourceOutcome::Skipped => summary.sources_skipped += 1,
                    SourceOutcome::Scraped { records, .. } => {
                        summary.sources_scraped += 1;
                        summary.records += records.len();
                    }
                    SourceOutcome::Failed { .. } => summary.sources_failed += 1,
                }
            }
            summary
        })
    }
}

/// Result of [`SalaryPipeline::run`]
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Same order as the input list, repeats removed
    pub companies: Vec<CompanyReport>,
    pub summary: RunSummary,
}

// ============================================================================
// Pipeline Implementation
// ============================================================================

/// Orchestrates freshness checks, fetching, parsing and persistence
pub struct SalaryPipeline {
    config: PipelineConfig,
    registry: SourceRegistry,
    fetcher: PageFetcher,
    gate: FreshnessGate,
    recorder: JobRecorder,
    store: SharedSalaryStore,
}

impl SalaryPipeline {
    /// Create a pipeline from the application configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn new(config: &Config, store: SharedSalaryStore) -> anyhow::Result<Self> {
        Self::with_config(PipelineConfig::from(&config.scraper), store)
    }

    /// Create a pipeline with an explicit pipeline configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn with_config(config: PipelineConfig, store: SharedSalaryStore) -> anyhow::Result<Self> {
        let fetcher =
            PageFetcher::with_config(config.requests_per_second, config.user_agent.clone())?;

        Ok(Self {
            gate: FreshnessGate::new(config.freshness_hours),
            recorder: JobRecorder::new(store.clone()),
            registry: SourceRegistry::new(),
            fetcher,
            store,
            config,
        })
    }

    /// Replace the URL templates (local mirrors, tests)
    #[must_use]
    pub fn with_registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process every company; never fails as a whole
    ///
    /// Names are trimmed and repeats dropped (first occurrence wins), so each
    /// (company, source) pair gets at most one job per run.
    pub async fn run(&self, companies: &[String]) -> RunReport {
        let started = Instant::now();

        let mut seen = HashSet::new();
        let companies: Vec<&str> = companies
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty() && seen.insert(*name))
            .collect();

        tracing::info!(
            companies = companies.len(),
            sources = ?self.config.sources,
            concurrency = self.config.max_concurrent_companies,
            threshold_hours = self.config.freshness_hours,
            "Starting salary pipeline"
        );

        let reports: Vec<CompanyReport> = stream::iter(companies)
            .map(|company| self.scrape_company(company))
            .buffered(self.config.max_concurrent_companies.max(1))
            .collect()
            .await;

        let summary = RunSummary::from_reports(&reports);
        tracing::info!(
            companies = summary.companies,
            company_errors = summary.company_errors,
            scraped = summary.sources_scraped,
            skipped = summary.sources_skipped,
            failed = summary.sources_failed,
            records = summary.records,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline completed"
        );

        RunReport {
            companies: reports,
            summary,
        }
    }

    /// Resolve the company, then walk the configured sources in order
    pub async fn scrape_company(&self, company: &str) -> CompanyReport {
        let span = tracing::info_span!("company", company = %company);

        async {
            let company_id = match self.store.get_or_create_company(company) {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to resolve company");
                    return CompanyReport::unresolved(company, &e);
                }
            };

            let mut outcomes = Vec::with_capacity(self.config.sources.len());
            for &source in &self.config.sources {
                let outcome = self.scrape_source(company, company_id, source).await;
                outcomes.push((source, outcome));
            }

            let report = CompanyReport {
                company: company.to_string(),
                company_id: Some(company_id),
                error: None,
                outcomes,
            };
            tracing::info!(counts = ?report.counts(), "Company processed");
            report
        }
        .instrument(span)
        .await
    }

    /// Run one (company, source) pair to a completed job
    pub async fn scrape_source(
        &self,
        company: &str,
        company_id: CompanyId,
        source: Source,
    ) -> SourceOutcome {
        let span = tracing::info_span!("source", source = %source);

        async {
            let (url, variant) = match self.plan(company, source) {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::error!(error = %e, "Source cannot be scraped");
                    return SourceOutcome::failed(None, &e);
                }
            };

            match self.gate.should_scrape(self.store.as_ref(), company, source) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(
                        threshold_hours = self.gate.threshold_hours(),
                        "Skipping, scraped recently"
                    );
                    return SourceOutcome::Skipped;
                }
                Err(e) => {
                    let error = ScrapeError::Persistence(e);
                    tracing::error!(error = %error, "Freshness check failed");
                    return SourceOutcome::failed(None, &error);
                }
            }

            let job = match self.recorder.start(company, company_id, source) {
                Ok(job) => job,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start scrape job");
                    return SourceOutcome::failed(None, &e);
                }
            };
            let job_id = job.id();

            let result = self
                .collect(company, company_id, source, variant, &url)
                .await
                .and_then(|records| {
                    let inserted = self
                        .store
                        .insert_salaries(&records)
                        .map_err(ScrapeError::Persistence)?;
                    Ok((records, inserted))
                });

            match result {
                Ok((records, inserted)) => {
                    if let Err(e) = job.succeed(inserted) {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to complete scrape job");
                        return SourceOutcome::failed(Some(job_id), &e);
                    }
                    if let Err(e) = self.store.update_source_last_scraped(source) {
                        tracing::warn!(error = %e, "Failed to update last-scraped marker");
                    }

                    tracing::info!(job_id = %job_id, records = inserted, url = %url, "Source scraped");
                    SourceOutcome::Scraped { job_id, records }
                }
                Err(e) => {
                    log_failure(&e, &url);
                    let outcome = SourceOutcome::failed(Some(job_id), &e);
                    if let Err(complete_err) = job.fail(&e) {
                        tracing::error!(
                            job_id = %job_id,
                            error = %complete_err,
                            "Failed to record scrape failure"
                        );
                    }
                    outcome
                }
            }
        }
        .instrument(span)
        .await
    }

    /// URL and parser for a pair; errors here are fatal to the pair
    fn plan(&self, company: &str, source: Source) -> Result<(String, ParserVariant), ScrapeError> {
        let variant = source
            .parser()
            .ok_or_else(|| ScrapeError::UnknownSource(format!("{source} (no parser)")))?;
        let url = self.registry.resolve_source(source, company)?;
        Ok((url, variant))
    }

    /// Fetch, extract and normalize
    async fn collect(
        &self,
        company: &str,
        company_id: CompanyId,
        source: Source,
        variant: ParserVariant,
        url: &str,
    ) -> Result<Vec<SalaryRecord>, ScrapeError> {
        let document = self.fetch(url).await?;
        let payload = extract_embedded(&document, NEXT_DATA_MARKER)?;

        let ctx = NormalizeContext {
            company_id,
            company_name: company,
            source,
            source_url: url,
            region: &self.config.region,
            captured_at: Utc::now(),
        };
        Ok(normalize(variant, &payload, &ctx)?)
    }

    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        crate::utils::retry::with_retry_if(
            &self.config.retry,
            || self.fetcher.fetch(url, self.config.request_timeout),
            FetchError::is_recoverable,
        )
        .await
    }
}

fn log_failure(error: &ScrapeError, url: &str) {
    match error {
        ScrapeError::Parse(ParseError::NoDataFound { .. }) => {
            tracing::info!(url = %url, error = %error, "No embedded data on page");
        }
        ScrapeError::Parse(ParseError::MalformedPayload { reason, snippet }) => {
            tracing::warn!(url = %url, reason = %reason, snippet = %snippet, "Malformed embedded payload");
        }
        _ if error.policy() == ErrorPolicy::Fatal => {
            tracing::error!(url = %url, error = %error, "Scrape failed");
        }
        _ => {
            tracing::warn!(url = %url, kind = ?error.kind(), error = %error, "Scrape failed, skipping source");
        }
    }
}
