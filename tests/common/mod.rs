//! Common test utilities

#![allow(dead_code)]

use serde_json::{json, Value};
use std::time::Duration;

use paygrade::crawler::{PipelineConfig, SalaryPipeline, SourceRegistry};
use paygrade::models::Source;
use paygrade::storage::SharedSalaryStore;
use paygrade::utils::retry::RetryConfig;

/// Wrap a payload in a server-rendered page
pub fn next_data_page(payload: &Value) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Salaries</title>
    <script src="/_next/static/chunks/main.js" defer></script>
</head>
<body>
    <div id="__next"><h1>Software Engineer Salaries</h1></div>
    <script id="__NEXT_DATA__" type="application/json">{payload}</script>
</body>
</html>"#
    )
}

/// Page without an embedded data block
pub const PAGE_WITHOUT_DATA: &str = r#"<!DOCTYPE html>
<html><head><title>Page not found</title></head>
<body><h1>We couldn't find that company</h1><script>window.x = 1;</script></body></html>"#;

/// Page whose data block is truncated
pub const PAGE_WITH_BROKEN_DATA: &str = r#"<!DOCTYPE html>
<html><head><title>Salaries</title></head>
<body><script id="__NEXT_DATA__" type="application/json">{"props": {"pageProps": {"averages": [</script></body></html>"#;

/// Leveling-site payload with two level averages
pub fn leveling_payload() -> Value {
    json!({
        "props": {
            "pageProps": {
                "locationExchangeRate": 83.0,
                "averages": [
                    {
                        "primaryLevelName": "L3",
                        "secondaryLevelName": "SDE I",
                        "rawValues": {"base": 20000, "bonus": 2000, "stock": 5000, "total": 27000},
                        "yearsOfExperience": 1,
                        "numDataPoints": 25
                    },
                    {
                        "primaryLevelName": "L4",
                        "rawValues": {"base": 30000, "bonus": 3000, "stock": 10000, "total": 43000},
                        "location": "Bengaluru"
                    }
                ]
            }
        },
        "page": "/companies/[company]/salaries"
    })
}

/// Aggregator-site payload with two buckets and three observations
pub fn aggregator_payload() -> Value {
    json!({
        "props": {
            "pageProps": {
                "salaryData": {
                    "roles": [
                        {
                            "role": "Software Engineer",
                            "individualSalaries": [
                                {"role": "SDE 1", "salary": 1200000, "yearsOfExperience": 1},
                                {"salary": 1800000, "yearsOfExperience": "3", "location": "Hyderabad"}
                            ]
                        },
                        {
                            "role": "Data Scientist",
                            "individualSalaries": [{"role": "Data Scientist II", "salary": 2500000}]
                        }
                    ]
                }
            }
        }
    })
}

/// Aggregator payload that legitimately holds no observations
pub fn empty_aggregator_payload() -> Value {
    json!({"props": {"pageProps": {"salaryData": {"roles": []}}}})
}

/// Fast pipeline settings for mock servers
pub fn test_config(sources: Vec<Source>) -> PipelineConfig {
    PipelineConfig {
        sources,
        requests_per_second: 1000,
        request_timeout: Duration::from_secs(5),
        retry: RetryConfig::with_delays(0, 10, 50),
        ..PipelineConfig::default()
    }
}

/// Registry pointing both scrapeable sources at a mock server
pub fn mock_registry(base_url: &str) -> SourceRegistry {
    SourceRegistry::empty()
        .with_template(Source::LevelsFyi, format!("{base_url}/levels/{{company}}"))
        .with_template(Source::Weekday, format!("{base_url}/weekday/{{company}}"))
}

/// Pipeline against a mock server
pub fn mock_pipeline(
    base_url: &str,
    store: SharedSalaryStore,
    config: PipelineConfig,
) -> SalaryPipeline {
    SalaryPipeline::with_config(config, store)
        .expect("pipeline")
        .with_registry(mock_registry(base_url))
}

pub fn companies(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
