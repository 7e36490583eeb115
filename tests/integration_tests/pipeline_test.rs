//! Pipeline integration tests
//!
//! Drives SalaryPipeline end to end against wiremock servers.

use std::sync::Arc;

use paygrade::crawler::SourceOutcome;
use paygrade::crawler::job::EMPTY_RESULT_NOTE;
use paygrade::models::{JobStatus, Source};
use paygrade::storage::{MemorySalaryStore, SalaryStore, SqliteSalaryStore};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    aggregator_payload, companies, empty_aggregator_payload, leveling_payload, mock_pipeline,
    next_data_page, test_config,
};

const BOTH: [Source; 2] = [Source::LevelsFyi, Source::Weekday];

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_pipeline_persists_both_sources() {
    let server = MockServer::start().await;
    mount_page(&server, "/levels/acme", next_data_page(&leveling_payload())).await;
    mount_page(&server, "/weekday/acme", next_data_page(&aggregator_payload())).await;

    let store = Arc::new(MemorySalaryStore::new());
    let pipeline = mock_pipeline(&server.uri(), store.clone(), test_config(BOTH.to_vec()));

    let report = pipeline.run(&companies(&["Acme"])).await;

    assert_eq!(report.companies.len(), 1);
    let company = &report.companies[0];
    assert!(company.error.is_none());
    assert_eq!(company.counts().get("levels_fyi"), Some(&2));
    assert_eq!(company.counts().get("weekday"), Some(&3));
    assert_eq!(report.summary.records, 5);
    assert_eq!(report.summary.sources_scraped, 2);

    let records = store.records().unwrap();
    assert_eq!(records.len(), 5);
    let company_id = company.company_id.unwrap();
    assert!(records.iter().all(|r| r.company_id == company_id));
    assert_eq!(store.salary_count(company_id).unwrap(), 5);

    let l3 = records
        .iter()
        .find(|r| r.designation == "L3 (SDE I)")
        .expect("L3 record");
    assert_eq!(l3.compensation.base, Some(20000.0 * 83.0));
    assert_eq!(l3.compensation.total, Some(27000.0 * 83.0));
    assert_eq!(l3.data_points, 25);
    assert_eq!(l3.location, "India");
    assert!(l3.source_url.ends_with("/levels/acme"));

    let hyderabad = records
        .iter()
        .find(|r| r.location == "Hyderabad")
        .expect("aggregator record");
    assert_eq!(hyderabad.designation, "Software Engineer");
    assert_eq!(hyderabad.years_of_experience, Some(3.0));
    assert_eq!(hyderabad.compensation.base, Some(1_800_000.0));
    assert_eq!(hyderabad.compensation.bonus, None);

    let jobs = store.jobs().unwrap();
    assert_eq!(jobs.len(), 2);
    for job in &jobs {
        assert_eq!(job.status, JobStatus::Success);
        assert!(job.completed_at.is_some());
    }
    let weekday_job = jobs.iter().find(|j| j.source == Source::Weekday).unwrap();
    assert_eq!(weekday_job.record_count, 3);

    assert!(store.source_last_scraped(Source::LevelsFyi).unwrap().is_some());
    assert!(store.source_last_scraped(Source::Weekday).unwrap().is_some());
}

#[tokio::test]
async fn test_second_run_is_suppressed_by_freshness() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/levels/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_string(next_data_page(&leveling_payload())))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weekday/acme"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(next_data_page(&aggregator_payload())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let pipeline = mock_pipeline(&server.uri(), store.clone(), test_config(BOTH.to_vec()));
    let names = companies(&["Acme"]);

    let first = pipeline.run(&names).await;
    assert_eq!(first.summary.records, 5);

    let second = pipeline.run(&names).await;
    assert_eq!(second.summary.records, 0);
    assert_eq!(second.summary.sources_skipped, 2);
    assert!(matches!(
        second.companies[0].outcome(Source::LevelsFyi),
        Some(SourceOutcome::Skipped)
    ));

    assert_eq!(store.records().unwrap().len(), 5);
    assert_eq!(store.jobs().unwrap().len(), 2, "skipped pairs record no job");
}

#[tokio::test]
async fn test_zero_threshold_always_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weekday/acme"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(next_data_page(&aggregator_payload())),
        )
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let mut config = test_config(vec![Source::Weekday]);
    config.freshness_hours = 0;
    let pipeline = mock_pipeline(&server.uri(), store.clone(), config);

    pipeline.run(&companies(&["Acme"])).await;
    pipeline.run(&companies(&["Acme"])).await;

    assert_eq!(store.records().unwrap().len(), 6);
}

#[tokio::test]
async fn test_empty_result_is_success_with_note() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/weekday/acme",
        next_data_page(&empty_aggregator_payload()),
    )
    .await;

    let store = Arc::new(MemorySalaryStore::new());
    let pipeline = mock_pipeline(&server.uri(), store.clone(), test_config(vec![Source::Weekday]));

    let report = pipeline.run(&companies(&["Acme"])).await;
    assert!(matches!(
        report.companies[0].outcome(Source::Weekday),
        Some(SourceOutcome::Scraped { records, .. }) if records.is_empty()
    ));

    let jobs = store.jobs().unwrap();
    assert_eq!(jobs[0].status, JobStatus::Success);
    assert_eq!(jobs[0].record_count, 0);
    assert_eq!(jobs[0].error_message.as_deref(), Some(EMPTY_RESULT_NOTE));
}

#[tokio::test]
async fn test_companies_keep_input_order() {
    let server = MockServer::start().await;
    for company in ["acme", "globex", "initech", "umbrella"] {
        mount_page(
            &server,
            &format!("/weekday/{company}"),
            next_data_page(&aggregator_payload()),
        )
        .await;
    }

    let store = Arc::new(MemorySalaryStore::new());
    let mut config = test_config(vec![Source::Weekday]);
    config.max_concurrent_companies = 3;
    let pipeline = mock_pipeline(&server.uri(), store.clone(), config);

    let names = companies(&["Umbrella", "Acme", "Initech", "Globex"]);
    let report = pipeline.run(&names).await;

    let order: Vec<&str> = report.companies.iter().map(|c| c.company.as_str()).collect();
    assert_eq!(order, vec!["Umbrella", "Acme", "Initech", "Globex"]);
    assert_eq!(report.summary.records, 12);
}

#[tokio::test]
async fn test_repeated_company_gets_one_job_per_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weekday/acme"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(next_data_page(&aggregator_payload())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemorySalaryStore::new());
    let mut config = test_config(vec![Source::Weekday]);
    config.max_concurrent_companies = 4;
    let pipeline = mock_pipeline(&server.uri(), store.clone(), config);

    let report = pipeline.run(&companies(&["Acme", " Acme ", "Acme"])).await;

    assert_eq!(report.companies.len(), 1);
    assert_eq!(report.summary.companies, 1);
    assert_eq!(report.summary.sources_scraped, 1);
    assert_eq!(report.summary.records, 3);
    assert_eq!(store.jobs().unwrap().len(), 1);
    assert_eq!(store.records().unwrap().len(), 3);
}

#[tokio::test]
async fn test_sqlite_freshness_survives_reopen() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/levels/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_string(next_data_page(&leveling_payload())))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data").join("paygrade.db");
    let names = companies(&["Acme"]);

    {
        let store = Arc::new(SqliteSalaryStore::new(&db_path).unwrap());
        let pipeline =
            mock_pipeline(&server.uri(), store.clone(), test_config(vec![Source::LevelsFyi]));
        let report = pipeline.run(&names).await;
        assert_eq!(report.summary.records, 2);
    }

    let store = Arc::new(SqliteSalaryStore::new(&db_path).unwrap());
    let pipeline = mock_pipeline(&server.uri(), store.clone(), test_config(vec![Source::LevelsFyi]));
    let report = pipeline.run(&names).await;
    assert_eq!(report.summary.sources_skipped, 1);

    let jobs = store.recent_jobs(Some("Acme"), 10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Success);
    assert_eq!(jobs[0].record_count, 2);
}
