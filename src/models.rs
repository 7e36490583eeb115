// Core data structures for the paygrade ingestion pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::utils::error::ScrapeError;

/// Opaque persistent identifier of a company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub Uuid);

impl CompanyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CompanyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a single scrape attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A company as known to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
}

/// Payload shape a source publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParserVariant {
    /// Level averages plus a locale exchange rate
    Leveling,
    /// Role buckets holding individual observations
    Aggregator,
}

/// Salary source enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    LevelsFyi,
    Weekday,
    Ambitionbox,
}

impl Source {
    /// Get string representation (also the persisted tag)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LevelsFyi => "levels_fyi",
            Self::Weekday => "weekday",
            Self::Ambitionbox => "ambitionbox",
        }
    }

    /// Parser variant for this source, if one exists
    pub fn parser(&self) -> Option<ParserVariant> {
        match self {
            Self::LevelsFyi => Some(ParserVariant::Leveling),
            Self::Weekday => Some(ParserVariant::Aggregator),
            Self::Ambitionbox => None,
        }
    }

    /// Get all registered sources
    pub fn all() -> Vec<Self> {
        vec![Self::LevelsFyi, Self::Weekday, Self::Ambitionbox]
    }

    /// Sources scraped when nothing else is configured
    pub fn scrapeable() -> Vec<Self> {
        Self::all()
            .into_iter()
            .filter(|s| s.parser().is_some())
            .collect()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "levels_fyi" | "levels.fyi" | "levelsfyi" => Ok(Self::LevelsFyi),
            "weekday" | "weekday.works" => Ok(Self::Weekday),
            "ambitionbox" => Ok(Self::Ambitionbox),
            _ => Err(ScrapeError::UnknownSource(s.to_string())),
        }
    }
}

/// Lifecycle state of a scrape job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Failed,
}

impl JobStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "running" => JobStatus::Running,
            "success" => JobStatus::Success,
            _ => JobStatus::Failed,
        })
    }
}

/// One recorded scrape attempt for a (company, source) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: JobId,
    pub company: String,
    pub company_id: CompanyId,
    pub source: Source,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub record_count: usize,
    pub error_message: Option<String>,
}

impl ScrapeJob {
    /// Create a job in the `running` state
    pub fn started(company: &str, company_id: CompanyId, source: Source) -> Self {
        Self {
            id: JobId::new(),
            company: company.to_string(),
            company_id,
            source,
            started_at: Utc::now(),
            completed_at: None,
            status: JobStatus::Running,
            record_count: 0,
            error_message: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status != JobStatus::Running
    }
}

/// Compensation components; absent fields are unknown, never fabricated
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CompensationBreakdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

impl CompensationBreakdown {
    /// Breakdown for sources that only report a single figure
    pub fn total_only(amount: Option<f64>) -> Self {
        Self {
            base: amount,
            bonus: None,
            stock: None,
            total: amount,
        }
    }
}

/// Canonical, source-agnostic salary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRecord {
    pub company_id: CompanyId,
    pub company_name: String,
    pub designation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_category: Option<String>,
    pub location: String,
    pub source: Source,
    pub compensation: CompensationBreakdown,
    pub years_of_experience: Option<f64>,
    pub data_points: u32,
    pub source_url: String,
    pub captured_at: DateTime<Utc>,
}
