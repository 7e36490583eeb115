//! Configuration management for paygrade
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `PAYGRADE_*` environment variables. Command-line flags are applied last by
//! the caller.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Source;

/// Default recency threshold: one week
pub const DEFAULT_FRESHNESS_HOURS: u32 = 168;

/// Default fetch timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scraper configuration
    pub scraper: ScraperConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Input/output files
    pub input: InputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Scraper-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Minimum hours between successful scrapes of a (company, source) pair
    pub freshness_hours: u32,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Rate limit (requests per second, process-wide)
    pub requests_per_second: u32,

    /// Companies processed in parallel
    pub max_concurrent_companies: usize,

    /// Extra attempts for recoverable fetch failures
    pub fetch_retries: u32,

    /// Fixed User-Agent; rotates through a browser pool when unset
    pub user_agent: Option<String>,

    /// Sources scraped for each company, in order
    pub sources: Vec<Source>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Input/output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// JSON array of company names
    pub companies_path: PathBuf,

    /// JSON output written in non-persistent mode
    pub output_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, compact, json)
    pub format: String,
}

impl ScraperConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            freshness_hours: DEFAULT_FRESHNESS_HOURS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            requests_per_second: 2,
            max_concurrent_companies: 4,
            fetch_retries: 0,
            user_agent: None,
            sources: Source::scrapeable(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/paygrade.db"),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            companies_path: PathBuf::from("companies.json"),
            output_path: PathBuf::from("salaries.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from an optional file, then apply the environment on top
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `PAYGRADE_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<u32>("PAYGRADE_FRESHNESS_HOURS")? {
            self.scraper.freshness_hours = v;
        }
        if let Some(v) = env_parse::<u64>("PAYGRADE_REQUEST_TIMEOUT")? {
            self.scraper.request_timeout_secs = v;
        }
        if let Some(v) = env_parse::<u32>("PAYGRADE_RATE_LIMIT")? {
            self.scraper.requests_per_second = v;
        }
        if let Some(v) = env_parse::<usize>("PAYGRADE_MAX_CONCURRENT_COMPANIES")? {
            self.scraper.max_concurrent_companies = v;
        }
        if let Some(v) = env_parse::<u32>("PAYGRADE_FETCH_RETRIES")? {
            self.scraper.fetch_retries = v;
        }
        if let Ok(v) = std::env::var("PAYGRADE_USER_AGENT") {
            self.scraper.user_agent = Some(v);
        }
        if let Ok(v) = std::env::var("PAYGRADE_SOURCES") {
            self.scraper.sources = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<Source>())
                .collect::<std::result::Result<_, _>>()
                .context("Invalid PAYGRADE_SOURCES")?;
        }
        if let Ok(v) = std::env::var("PAYGRADE_SQLITE_PATH") {
            self.database.sqlite_path = v.into();
        }
        if let Ok(v) = std::env::var("PAYGRADE_COMPANIES") {
            self.input.companies_path = v.into();
        }
        if let Ok(v) = std::env::var("PAYGRADE_OUTPUT") {
            self.input.output_path = v.into();
        }
        if let Ok(v) = std::env::var("PAYGRADE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("PAYGRADE_LOG_FORMAT") {
            self.logging.format = v;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scraper.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.scraper.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.scraper.max_concurrent_companies == 0 {
            anyhow::bail!("max_concurrent_companies must be greater than 0");
        }

        if self.scraper.sources.is_empty() {
            anyhow::bail!("at least one source must be configured");
        }

        if let Some(source) = self.scraper.sources.iter().find(|s| s.parser().is_none()) {
            anyhow::bail!("source {source} has no parser and cannot be scraped");
        }

        Ok(())
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {key}: {v}")),
        Err(_) => Ok(None),
    }
}
