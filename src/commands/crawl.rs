use std::path::PathBuf;

use paygrade::config::Config;
use paygrade::error::{Error, Result};
use paygrade::crawler::{CompanyReport, SalaryPipeline, SourceOutcome};
use paygrade::models::Source;
use paygrade::storage::{load_companies, open_store, write_salaries};

/// Command-line overrides for a crawl
#[derive(Debug, Default)]
pub struct CrawlParams {
    pub companies: Option<PathBuf>,
    pub sources: Vec<String>,
    pub threshold_hours: Option<u32>,
    pub timeout: Option<u64>,
    pub database: Option<PathBuf>,
    pub dry_run: bool,
    pub output: Option<PathBuf>,
}

impl CrawlParams {
    /// Apply the flags on top of the loaded configuration
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(path) = &self.companies {
            config.input.companies_path = path.clone();
        }
        if !self.sources.is_empty() {
            config.scraper.sources = self
                .sources
                .iter()
                .map(|s| s.parse::<Source>())
                .collect::<std::result::Result<_, _>>()?;
        }
        if let Some(hours) = self.threshold_hours {
            config.scraper.freshness_hours = hours;
        }
        if let Some(secs) = self.timeout {
            config.scraper.request_timeout_secs = secs;
        }
        if let Some(path) = &self.database {
            config.database.sqlite_path = path.clone();
        }
        if let Some(path) = &self.output {
            config.input.output_path = path.clone();
        }
        Ok(())
    }
}

pub async fn crawl(mut config: Config, params: CrawlParams) -> Result<()> {
    params.apply(&mut config)?;
    config
        .validate()
        .map_err(|e| Error::config(format!("{e:#}")))?;

    let companies = load_companies(&config.input.companies_path)?;

    println!("Starting Salary Crawl");
    println!("=====================");
    println!("Companies: {}", companies.len());
    println!(
        "Sources: {}",
        config
            .scraper
            .sources
            .iter()
            .map(Source::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Freshness threshold: {}h", config.scraper.freshness_hours);

    if companies.is_empty() {
        println!("\nNothing to do: company list is empty.");
        return Ok(());
    }

    let store = open_store(&config.database.sqlite_path, params.dry_run)?;
    let pipeline = SalaryPipeline::new(&config, store)?;
    let report = pipeline.run(&companies).await;

    println!();
    for company in &report.companies {
        print_company(company);
    }

    let summary = report.summary;
    println!("\nCrawl Summary");
    println!("=============");
    println!("Companies: {}", summary.companies);
    println!("Records persisted: {}", summary.records);
    println!("Sources scraped: {}", summary.sources_scraped);
    println!("Sources skipped (fresh): {}", summary.sources_skipped);
    println!("Sources failed: {}", summary.sources_failed);
    if summary.company_errors > 0 {
        println!("Companies not resolved: {}", summary.company_errors);
    }

    if params.dry_run || params.output.is_some() {
        write_salaries(&config.input.output_path, &report.companies)?;
        println!("Output file: {}", config.input.output_path.display());
    }
    if !params.dry_run {
        println!("Database: {}", config.database.sqlite_path.display());
    }

    Ok(())
}

fn print_company(report: &CompanyReport) {
    if let Some(error) = &report.error {
        println!("{:<24} ERROR {error}", report.company);
        return;
    }

    let cells: Vec<String> = report
        .outcomes
        .iter()
        .map(|(source, outcome)| match outcome {
            SourceOutcome::Skipped => format!("{source}=fresh"),
            SourceOutcome::Scraped { records, .. } => format!("{source}={}", records.len()),
            SourceOutcome::Failed { kind, .. } => format!("{source}=failed({kind:?})"),
        })
        .collect();

    println!("{:<24} {}", report.company, cells.join("  "));
}
