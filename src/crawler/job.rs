//! Scrape job recorder
//!
//! A job is started before any write for its (company, source) pair and
//! completed exactly once. [`ActiveJob`] completes itself as failed when it is
//! dropped without an explicit outcome, so no exit path leaves a job running.

use crate::models::{CompanyId, JobId, JobStatus, Source};
use crate::storage::repository::{SalaryStore, SharedSalaryStore};
use crate::utils::error::ScrapeError;

/// Error message stored when a job is dropped without an outcome
pub const ABORTED_MESSAGE: &str = "scrape aborted before completion";

/// Note stored on a successful job that legitimately found nothing
pub const EMPTY_RESULT_NOTE: &str = "No salary data found";

/// Starts scrape jobs against a store
#[derive(Clone)]
pub struct JobRecorder {
    store: SharedSalaryStore,
}

impl JobRecorder {
    pub fn new(store: SharedSalaryStore) -> Self {
        Self { store }
    }

    /// Record the start of a job
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::Persistence` if the store rejects the write
    pub fn start(
        &self,
        company: &str,
        company_id: CompanyId,
        source: Source,
    ) -> Result<ActiveJob<'_>, ScrapeError> {
        let id = self
            .store
            .start_scrape(company, source, company_id)
            .map_err(ScrapeError::Persistence)?;

        tracing::debug!(company = %company, source = %source, job_id = %id, "Scrape job started");

        Ok(ActiveJob {
            store: self.store.as_ref(),
            id,
            company: company.to_string(),
            source,
            completed: false,
        })
    }
}

/// A running job; completing it consumes the handle
pub struct ActiveJob<'a> {
    store: &'a dyn SalaryStore,
    id: JobId,
    company: String,
    source: Source,
    completed: bool,
}

impl ActiveJob<'_> {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Complete as success with the number of records actually persisted
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::Persistence` if the store rejects the write
    pub fn succeed(mut self, count: usize) -> Result<(), ScrapeError> {
        let note = (count == 0).then_some(EMPTY_RESULT_NOTE);
        self.complete(JobStatus::Success, count, note)
    }

    /// Complete as failed with the error's message
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::Persistence` if the store rejects the write
    pub fn fail(mut self, error: &ScrapeError) -> Result<(), ScrapeError> {
        let message = error.to_string();
        self.complete(JobStatus::Failed, 0, Some(message.as_str()))
    }

    fn complete(
        &mut self,
        status: JobStatus,
        count: usize,
        error: Option<&str>,
    ) -> Result<(), ScrapeError> {
        self.store
            .complete_scrape(self.id, status, count, error)
            .map_err(ScrapeError::Persistence)?;
        self.completed = true;

        tracing::debug!(
            company = %self.company,
            source = %self.source,
            job_id = %self.id,
            status = status.as_str(),
            records = count,
            "Scrape job completed"
        );
        Ok(())
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }

        tracing::warn!(
            company = %self.company,
            source = %self.source,
            job_id = %self.id,
            "Scrape job dropped while running, marking failed"
        );

        if let Err(e) = self
            .store
            .complete_scrape(self.id, JobStatus::Failed, 0, Some(ABORTED_MESSAGE))
        {
            tracing::error!(job_id = %self.id, error = %e, "Failed to close abandoned scrape job");
        }
    }
}
