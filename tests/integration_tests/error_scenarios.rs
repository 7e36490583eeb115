//! Error scenario tests
//!
//! Every failing (company, source) pair must end with a completed job, and no
//! failure may stop the remaining sources or companies.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use paygrade::crawler::SourceOutcome;
use paygrade::models::{CompanyId, JobId, JobStatus, SalaryRecord, ScrapeJob, Source};
use paygrade::storage::{MemorySalaryStore, SalaryStore};
use paygrade::utils::error::ScrapeErrorKind;
use paygrade::utils::retry::RetryConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    aggregator_payload, companies, leveling_payload, mock_pipeline, next_data_page, test_config,
    PAGE_WITHOUT_DATA, PAGE_WITH_BROKEN_DATA,
};

/// Memory store with switchable failures
struct FlakyStore {
    inner: MemorySalaryStore,
    fail_insert: bool,
    fail_company: Option<&'static str>,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemorySalaryStore::new(),
            fail_insert: false,
            fail_company: None,
        }
    }
}

impl SalaryStore for FlakyStore {
    fn get_or_create_company(&self, name: &str) -> Result<CompanyId> {
        if self.fail_company == Some(name) {
            return Err(anyhow!("database is locked"));
        }
        self.inner.get_or_create_company(name)
    }

    fn last_successful_scrape(
        &self,
        company: &str,
        source: Source,
    ) -> Result<Option<DateTime<Utc>>> {
        self.inner.last_successful_scrape(company, source)
    }

    fn start_scrape(&self, company: &str, source: Source, company_id: CompanyId) -> Result<JobId> {
        self.inner.start_scrape(company, source, company_id)
    }

    fn complete_scrape(
        &self,
        job_id: JobId,
        status: JobStatus,
        count: usize,
        error: Option<&str>,
    ) -> Result<()> {
        self.inner.complete_scrape(job_id, status, count, error)
    }

    fn insert_salaries(&self, records: &[SalaryRecord]) -> Result<usize> {
        if self.fail_insert {
            return Err(anyhow!("disk I/O error"));
        }
        self.inner.insert_salaries(records)
    }

    fn update_source_last_scraped(&self, source: Source) -> Result<()> {
        self.inner.update_source_last_scraped(source)
    }

    fn scrape_job(&self, job_id: JobId) -> Result<Option<ScrapeJob>> {
        self.inner.scrape_job(job_id)
    }

    fn recent_jobs(&self, company: Option<&str>, limit: usize) -> Result<Vec<ScrapeJob>> {
        self.inner.recent_jobs(company, limit)
    }

    fn salary_count(&self, company_id: CompanyId) -> Result<usize> {
        self.inner.salary_count(company_id)
    }
}

fn failure_kind(outcome: Option<&SourceOutcome>) -> Option<ScrapeErrorKind> {
    match outcome {
        Some(SourceOutcome::Failed { kind, .. }) => Some(*kind),
        _ => None,
    }
}

fn job_for(jobs: &[ScrapeJob], source: Source) -> &ScrapeJob {
    jobs.iter()
        .find(|j| j.source == source)
        .expect("job for source")
}

#[tokio::test]
async fn test_fetch_failure_does_not_block_other_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/levels/acme"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weekday/acme"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(next_data_page(&aggregator_payload())),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let pipeline = mock_pipeline(
        &server.uri(),
        store.clone(),
        test_config(vec![Source::LevelsFyi, Source::Weekday]),
    );

    let report = pipeline.run(&companies(&["Acme"])).await;
    let company = &report.companies[0];

    assert_eq!(
        failure_kind(company.outcome(Source::LevelsFyi)),
        Some(ScrapeErrorKind::Fetch)
    );
    assert_eq!(company.counts().get("weekday"), Some(&3));

    let jobs = store.jobs().unwrap();
    assert_eq!(jobs.len(), 2);
    let failed = job_for(&jobs, Source::LevelsFyi);
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.record_count, 0);
    assert!(failed.error_message.as_deref().unwrap().contains("500"));
    assert_eq!(job_for(&jobs, Source::Weekday).status, JobStatus::Success);

    assert!(store.source_last_scraped(Source::LevelsFyi).unwrap().is_none());
}

#[tokio::test]
async fn test_failure_does_not_suppress_next_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/levels/acme"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let pipeline = mock_pipeline(
        &server.uri(),
        store.clone(),
        test_config(vec![Source::LevelsFyi]),
    );
    let names = companies(&["Acme"]);

    let first = pipeline.run(&names).await;
    assert_eq!(first.summary.sources_failed, 1);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/levels/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_string(next_data_page(&leveling_payload())))
        .mount(&server)
        .await;

    let second = pipeline.run(&names).await;
    assert_eq!(second.summary.sources_scraped, 1);
    assert_eq!(second.summary.records, 2);
}

#[tokio::test]
async fn test_missing_marker_records_no_data_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/levels/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_WITHOUT_DATA))
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let pipeline = mock_pipeline(
        &server.uri(),
        store.clone(),
        test_config(vec![Source::LevelsFyi]),
    );

    let report = pipeline.run(&companies(&["Acme"])).await;
    assert_eq!(
        failure_kind(report.companies[0].outcome(Source::LevelsFyi)),
        Some(ScrapeErrorKind::NoDataFound)
    );

    let job = &store.jobs().unwrap()[0];
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("No __NEXT_DATA__ found")
    );
}

#[tokio::test]
async fn test_broken_payload_records_malformed_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weekday/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_WITH_BROKEN_DATA))
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let pipeline = mock_pipeline(
        &server.uri(),
        store.clone(),
        test_config(vec![Source::Weekday]),
    );

    let report = pipeline.run(&companies(&["Acme"])).await;
    assert_eq!(
        failure_kind(report.companies[0].outcome(Source::Weekday)),
        Some(ScrapeErrorKind::MalformedPayload)
    );

    let job = &store.jobs().unwrap()[0];
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.is_completed());
    assert!(store.records().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_payload_shape_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/levels/acme"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(next_data_page(&serde_json::json!({"buildId": "abc"}))),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let pipeline = mock_pipeline(
        &server.uri(),
        store.clone(),
        test_config(vec![Source::LevelsFyi]),
    );

    let report = pipeline.run(&companies(&["Acme"])).await;
    assert_eq!(
        failure_kind(report.companies[0].outcome(Source::LevelsFyi)),
        Some(ScrapeErrorKind::MalformedPayload)
    );
}

#[tokio::test]
async fn test_insert_failure_records_persistence_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weekday/acme"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(next_data_page(&aggregator_payload())),
        )
        .mount(&server)
        .await;

    let store = Arc::new(FlakyStore {
        fail_insert: true,
        ..FlakyStore::new()
    });
    let pipeline = mock_pipeline(
        &server.uri(),
        store.clone(),
        test_config(vec![Source::Weekday]),
    );

    let report = pipeline.run(&companies(&["Acme"])).await;
    assert_eq!(
        failure_kind(report.companies[0].outcome(Source::Weekday)),
        Some(ScrapeErrorKind::Persistence)
    );

    let jobs = store.recent_jobs(None, 10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert!(jobs[0].error_message.as_deref().unwrap().contains("disk I/O error"));
    assert!(store.inner.records().unwrap().is_empty());
}

#[tokio::test]
async fn test_unresolved_company_does_not_stop_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weekday/globex"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(next_data_page(&aggregator_payload())),
        )
        .mount(&server)
        .await;

    let store = Arc::new(FlakyStore {
        fail_company: Some("Acme"),
        ..FlakyStore::new()
    });
    let pipeline = mock_pipeline(
        &server.uri(),
        store.clone(),
        test_config(vec![Source::Weekday]),
    );

    let report = pipeline.run(&companies(&["Acme", "Globex"])).await;

    let acme = &report.companies[0];
    assert!(acme.error.as_deref().unwrap().contains("database is locked"));
    assert!(acme.outcomes.is_empty());
    assert!(acme.company_id.is_none());

    assert_eq!(report.companies[1].total_records(), 3);
    assert_eq!(report.summary.company_errors, 1);
}

#[tokio::test]
async fn test_recoverable_fetch_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weekday/acme"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weekday/acme"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(next_data_page(&aggregator_payload())),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let mut config = test_config(vec![Source::Weekday]);
    config.retry = RetryConfig::with_delays(2, 10, 50);
    let pipeline = mock_pipeline(&server.uri(), store.clone(), config);

    let report = pipeline.run(&companies(&["Acme"])).await;
    assert_eq!(report.companies[0].total_records(), 3);

    let jobs = store.jobs().unwrap();
    assert_eq!(jobs.len(), 1, "retries stay within one job");
    assert_eq!(jobs[0].status, JobStatus::Success);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weekday/acme"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let mut config = test_config(vec![Source::Weekday]);
    config.retry = RetryConfig::with_delays(3, 10, 50);
    let pipeline = mock_pipeline(&server.uri(), store.clone(), config);

    let report = pipeline.run(&companies(&["Acme"])).await;
    assert_eq!(
        failure_kind(report.companies[0].outcome(Source::Weekday)),
        Some(ScrapeErrorKind::Fetch)
    );
}
