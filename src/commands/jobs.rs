use std::path::Path;

use paygrade::error::Result;
use paygrade::models::ScrapeJob;
use paygrade::storage::{SalaryStore, SqliteSalaryStore};

/// List the most recent scrape jobs, newest first
pub fn jobs(database: &Path, company: Option<&str>, limit: usize) -> Result<()> {
    if !database.exists() {
        println!("Database not found: {}", database.display());
        println!("Run a crawl first to create the database.");
        return Ok(());
    }

    let store = SqliteSalaryStore::new(database)?;
    let jobs = store.recent_jobs(company, limit)?;

    if jobs.is_empty() {
        println!("No scrape jobs recorded.");
        return Ok(());
    }

    println!(
        "{:<20} {:<12} {:<8} {:>7}  {:<25} MESSAGE",
        "COMPANY", "SOURCE", "STATUS", "RECORDS", "STARTED"
    );
    for job in &jobs {
        println!("{}", format_job(job));
    }
    println!("\n{} job(s)", jobs.len());

    Ok(())
}

fn format_job(job: &ScrapeJob) -> String {
    format!(
        "{:<20} {:<12} {:<8} {:>7}  {:<25} {}",
        job.company,
        job.source.as_str(),
        job.status.as_str(),
        job.record_count,
        job.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        job.error_message.as_deref().unwrap_or("")
    )
}
