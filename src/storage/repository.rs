//! Repository Pattern for the salary store
//!
//! The ingestion pipeline only talks to [`SalaryStore`]; the backend is an
//! external collaborator.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        SalaryPipeline / FreshnessGate / JobRecorder          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SalaryStore trait                       │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                             │
//!                   ▼                             ▼
//!        ┌─────────────────────┐       ┌─────────────────────┐
//!        │  SqliteSalaryStore  │       │  MemorySalaryStore  │
//!        │    (persistent)     │       │ (dry-run, testing)  │
//!        └─────────────────────┘       └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use paygrade::storage::repository::{create_memory_store, create_sqlite_store};
//!
//! // Production: use SQLite
//! let store = create_sqlite_store("data/paygrade.db")?;
//!
//! // Dry runs and tests: keep everything in memory
//! let store = create_memory_store();
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::crawler::freshness::FreshnessGate;
use crate::models::{CompanyId, JobId, JobStatus, SalaryRecord, ScrapeJob, Source};

// ============================================================================
// Repository Trait
// ============================================================================

/// Persistence operations needed by the ingestion pipeline
///
/// Implementations must serialize concurrent `get_or_create_company` calls so
/// parallel workers never create the same company twice.
pub trait SalaryStore: Send + Sync {
    /// Resolve a company name to its identifier, creating it on first sight
    fn get_or_create_company(&self, name: &str) -> Result<CompanyId>;

    /// Completion time of the most recent successful scrape
    fn last_successful_scrape(
        &self,
        company: &str,
        source: Source,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Whether a successful scrape finished within the last `hours`
    fn has_recent_scrape(&self, company: &str, source: Source, hours: u32) -> Result<bool> {
        let last = self.last_successful_scrape(company, source)?;
        Ok(FreshnessGate::new(hours).is_fresh(last, Utc::now()))
    }

    /// Record the start of a scrape attempt
    fn start_scrape(&self, company: &str, source: Source, company_id: CompanyId) -> Result<JobId>;

    /// Complete a running scrape job; completed jobs are immutable
    fn complete_scrape(
        &self,
        job_id: JobId,
        status: JobStatus,
        count: usize,
        error: Option<&str>,
    ) -> Result<()>;

    /// Insert records in one batch, returning how many were written
    fn insert_salaries(&self, records: &[SalaryRecord]) -> Result<usize>;

    /// Mark a source as scraped now
    fn update_source_last_scraped(&self, source: Source) -> Result<()>;

    /// Get a scrape job by ID
    fn scrape_job(&self, job_id: JobId) -> Result<Option<ScrapeJob>>;

    /// Most recent jobs first, optionally for a single company
    fn recent_jobs(&self, company: Option<&str>, limit: usize) -> Result<Vec<ScrapeJob>>;

    /// Number of stored salary records for a company
    fn salary_count(&self, company_id: CompanyId) -> Result<usize>;
}

fn ensure_terminal(job_id: JobId, status: JobStatus) -> Result<()> {
    if status == JobStatus::Running {
        anyhow::bail!("cannot complete scrape job {job_id} with status running");
    }
    Ok(())
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in store: {s}"))
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of SalaryStore
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteSalaryStore {
    conn: Mutex<Connection>,
}

/// Raw `scrape_jobs` row before validation
struct JobRow {
    id: String,
    company: String,
    company_id: String,
    source: String,
    started_at: String,
    completed_at: Option<String>,
    status: String,
    record_count: i64,
    error_message: Option<String>,
}

impl JobRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            company: row.get(1)?,
            company_id: row.get(2)?,
            source: row.get(3)?,
            started_at: row.get(4)?,
            completed_at: row.get(5)?,
            status: row.get(6)?,
            record_count: row.get(7)?,
            error_message: row.get(8)?,
        })
    }

    fn into_job(self) -> Result<ScrapeJob> {
        Ok(ScrapeJob {
            id: JobId(Uuid::parse_str(&self.id).context("Invalid job id")?),
            company: self.company,
            company_id: CompanyId(Uuid::parse_str(&self.company_id).context("Invalid company id")?),
            source: self.source.parse()?,
            started_at: parse_timestamp(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
            status: self
                .status
                .parse()
                .unwrap_or(JobStatus::Failed),
            record_count: usize::try_from(self.record_count).unwrap_or(0),
            error_message: self.error_message,
        })
    }
}

const JOB_COLUMNS: &str = "id, company, company_id, source, started_at, completed_at, status, record_count, error_message";

impl SqliteSalaryStore {
    /// Create a new SQLite store
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite salary store initialized");
        Ok(store)
    }

    /// Create in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS companies (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS scrape_jobs (
                    id TEXT PRIMARY KEY,
                    company TEXT NOT NULL,
                    company_id TEXT NOT NULL REFERENCES companies(id),
                    source TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    completed_at TEXT,
                    status TEXT NOT NULL DEFAULT 'running'
                        CHECK (status IN ('running', 'success', 'failed')),
                    record_count INTEGER NOT NULL DEFAULT 0,
                    error_message TEXT
                );

                CREATE INDEX IF NOT EXISTS idx_scrape_jobs_lookup
                    ON scrape_jobs(company, source, status, completed_at);

                CREATE TABLE IF NOT EXISTS salaries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    company_id TEXT NOT NULL REFERENCES companies(id),
                    company_name TEXT NOT NULL,
                    designation TEXT NOT NULL,
                    level TEXT,
                    role_category TEXT,
                    location TEXT NOT NULL,
                    source TEXT NOT NULL,
                    base_salary REAL,
                    bonus REAL,
                    stock_compensation REAL,
                    total_compensation REAL,
                    years_of_experience REAL,
                    data_points_count INTEGER NOT NULL DEFAULT 1,
                    source_url TEXT NOT NULL,
                    captured_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_salaries_company
                    ON salaries(company_id);

                CREATE TABLE IF NOT EXISTS data_sources (
                    name TEXT PRIMARY KEY,
                    last_scraped_at TEXT NOT NULL
                );
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    /// Last-scraped marker of a source
    pub fn source_last_scraped(&self, source: Source) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT last_scraped_at FROM data_sources WHERE name = ?1",
                params![source.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read data source marker")?;

        value.as_deref().map(parse_timestamp).transpose()
    }
}

impl SalaryStore for SqliteSalaryStore {
    fn get_or_create_company(&self, name: &str) -> Result<CompanyId> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO companies (id, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO NOTHING",
            params![CompanyId::new().to_string(), name, timestamp(Utc::now())],
        )
        .context("Failed to create company")?;

        let id: String = conn
            .query_row(
                "SELECT id FROM companies WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .context("Failed to look up company")?;

        Ok(CompanyId(Uuid::parse_str(&id).context("Invalid company id")?))
    }

    fn last_successful_scrape(
        &self,
        company: &str,
        source: Source,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT MAX(completed_at) FROM scrape_jobs
                 WHERE company = ?1 AND source = ?2 AND status = 'success'",
                params![company, source.as_str()],
                |row| row.get(0),
            )
            .context("Failed to query scrape history")?;

        value.as_deref().map(parse_timestamp).transpose()
    }

    fn start_scrape(&self, company: &str, source: Source, company_id: CompanyId) -> Result<JobId> {
        let conn = self.conn()?;
        let job = ScrapeJob::started(company, company_id, source);

        conn.execute(
            r#"
                INSERT INTO scrape_jobs (id, company, company_id, source, started_at, status)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            params![
                job.id.to_string(),
                company,
                company_id.to_string(),
                source.as_str(),
                timestamp(job.started_at),
                job.status.as_str()
            ],
        )
        .context("Failed to start scrape job")?;

        Ok(job.id)
    }

    fn complete_scrape(
        &self,
        job_id: JobId,
        status: JobStatus,
        count: usize,
        error: Option<&str>,
    ) -> Result<()> {
        ensure_terminal(job_id, status)?;

        let conn = self.conn()?;
        let updated = conn
            .execute(
                r#"
                    UPDATE scrape_jobs
                    SET status = ?2, record_count = ?3, error_message = ?4, completed_at = ?5
                    WHERE id = ?1 AND status = 'running'
                    "#,
                params![
                    job_id.to_string(),
                    status.as_str(),
                    count as i64,
                    error,
                    timestamp(Utc::now())
                ],
            )
            .context("Failed to complete scrape job")?;

        if updated == 0 {
            anyhow::bail!("scrape job {job_id} is not running");
        }

        Ok(())
    }

    fn insert_salaries(&self, records: &[SalaryRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction().context("Failed to begin transaction")?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                r#"
                    INSERT INTO salaries (
                        company_id, company_name, designation, level, role_category, location,
                        source, base_salary, bonus, stock_compensation, total_compensation,
                        years_of_experience, data_points_count, source_url, captured_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                    "#,
            )?;

            for record in records {
                inserted += stmt
                    .execute(params![
                        record.company_id.to_string(),
                        record.company_name,
                        record.designation,
                        record.level,
                        record.role_category,
                        record.location,
                        record.source.as_str(),
                        record.compensation.base,
                        record.compensation.bonus,
                        record.compensation.stock,
                        record.compensation.total,
                        record.years_of_experience,
                        record.data_points,
                        record.source_url,
                        timestamp(record.captured_at)
                    ])
                    .context("Failed to insert salary record")?;
            }
        }

        tx.commit().context("Failed to commit salary batch")?;
        Ok(inserted)
    }

    fn update_source_last_scraped(&self, source: Source) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
                INSERT INTO data_sources (name, last_scraped_at)
                VALUES (?1, ?2)
                ON CONFLICT(name) DO UPDATE SET
                    last_scraped_at = excluded.last_scraped_at
                "#,
            params![source.as_str(), timestamp(Utc::now())],
        )
        .context("Failed to update data source marker")?;

        Ok(())
    }

    fn scrape_job(&self, job_id: JobId) -> Result<Option<ScrapeJob>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM scrape_jobs WHERE id = ?1"),
                params![job_id.to_string()],
                JobRow::from_row,
            )
            .optional()
            .context("Failed to get scrape job")?;

        row.map(JobRow::into_job).transpose()
    }

    fn recent_jobs(&self, company: Option<&str>, limit: usize) -> Result<Vec<ScrapeJob>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM scrape_jobs
             WHERE (?1 IS NULL OR company = ?1)
             ORDER BY started_at DESC LIMIT ?2"
        ))?;

        let rows = stmt
            .query_map(params![company, limit as i64], JobRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list scrape jobs")?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    fn salary_count(&self, company_id: CompanyId) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM salaries WHERE company_id = ?1",
            params![company_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

// ============================================================================
// In-memory Implementation
// ============================================================================

#[derive(Default)]
struct MemoryState {
    companies: HashMap<String, CompanyId>,
    jobs: HashMap<JobId, ScrapeJob>,
    salaries: Vec<SalaryRecord>,
    source_marks: HashMap<Source, DateTime<Utc>>,
}

/// In-memory implementation of SalaryStore
///
/// Backs non-persistent runs and tests. A single lock guards all state, so
/// company creation is serialized like the SQLite backend.
#[derive(Default)]
pub struct MemorySalaryStore {
    state: RwLock<MemoryState>,
}

impl MemorySalaryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Insert a job with arbitrary history (backfills, tests)
    pub fn seed_job(&self, job: ScrapeJob) -> Result<()> {
        self.write()?.jobs.insert(job.id, job);
        Ok(())
    }

    /// All stored salary records
    pub fn records(&self) -> Result<Vec<SalaryRecord>> {
        Ok(self.read()?.salaries.clone())
    }

    /// All jobs, oldest first
    pub fn jobs(&self) -> Result<Vec<ScrapeJob>> {
        let mut jobs: Vec<_> = self.read()?.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.started_at);
        Ok(jobs)
    }

    /// Last-scraped marker of a source
    pub fn source_last_scraped(&self, source: Source) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read()?.source_marks.get(&source).copied())
    }
}

impl SalaryStore for MemorySalaryStore {
    fn get_or_create_company(&self, name: &str) -> Result<CompanyId> {
        let mut state = self.write()?;
        Ok(*state
            .companies
            .entry(name.to_string())
            .or_insert_with(CompanyId::new))
    }

    fn last_successful_scrape(
        &self,
        company: &str,
        source: Source,
    ) -> Result<Option<DateTime<Utc>>> {
        let state = self.read()?;
        Ok(state
            .jobs
            .values()
            .filter(|j| j.company == company && j.source == source)
            .filter(|j| j.status == JobStatus::Success)
            .filter_map(|j| j.completed_at)
            .max())
    }

    fn start_scrape(&self, company: &str, source: Source, company_id: CompanyId) -> Result<JobId> {
        let job = ScrapeJob::started(company, company_id, source);
        let id = job.id;
        self.write()?.jobs.insert(id, job);
        Ok(id)
    }

    fn complete_scrape(
        &self,
        job_id: JobId,
        status: JobStatus,
        count: usize,
        error: Option<&str>,
    ) -> Result<()> {
        ensure_terminal(job_id, status)?;

        let mut state = self.write()?;
        let job = state
            .jobs
            .get_mut(&job_id)
            .filter(|j| !j.is_completed())
            .ok_or_else(|| anyhow!("scrape job {job_id} is not running"))?;

        job.status = status;
        job.record_count = count;
        job.error_message = error.map(String::from);
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    fn insert_salaries(&self, records: &[SalaryRecord]) -> Result<usize> {
        let mut state = self.write()?;
        state.salaries.extend_from_slice(records);
        Ok(records.len())
    }

    fn update_source_last_scraped(&self, source: Source) -> Result<()> {
        self.write()?.source_marks.insert(source, Utc::now());
        Ok(())
    }

    fn scrape_job(&self, job_id: JobId) -> Result<Option<ScrapeJob>> {
        Ok(self.read()?.jobs.get(&job_id).cloned())
    }

    fn recent_jobs(&self, company: Option<&str>, limit: usize) -> Result<Vec<ScrapeJob>> {
        let mut jobs: Vec<_> = self
            .read()?
            .jobs
            .values()
            .filter(|j| company.map_or(true, |c| j.company == c))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    fn salary_count(&self, company_id: CompanyId) -> Result<usize> {
        Ok(self
            .read()?
            .salaries
            .iter()
            .filter(|r| r.company_id == company_id)
            .count())
    }
}

// ============================================================================
// Shared Store Types
// ============================================================================

/// Thread-safe shared store handle
pub type SharedSalaryStore = Arc<dyn SalaryStore>;

/// Create a shared SQLite store
pub fn create_sqlite_store(path: impl AsRef<Path>) -> Result<SharedSalaryStore> {
    Ok(Arc::new(SqliteSalaryStore::new(path)?))
}

/// Create a shared in-memory store
pub fn create_memory_store() -> SharedSalaryStore {
    Arc::new(MemorySalaryStore::new())
}

// ============================================================================
// Tests
// ============================================================================
