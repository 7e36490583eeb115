//! Freshness gate
//!
//! Decides per (company, source) whether a new fetch is warranted. Only
//! successful scrapes count; failures never suppress a retry. Must be
//! consulted before any network call for the pair.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::config::DEFAULT_FRESHNESS_HOURS;
use crate::models::Source;
use crate::storage::repository::SalaryStore;

/// Recency threshold for successful scrapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessGate {
    threshold_hours: u32,
}

impl FreshnessGate {
    #[must_use]
    pub fn new(threshold_hours: u32) -> Self {
        Self { threshold_hours }
    }

    pub fn threshold_hours(&self) -> u32 {
        self.threshold_hours
    }

    pub fn threshold(&self) -> Duration {
        Duration::hours(i64::from(self.threshold_hours))
    }

    /// A success at `T` stays fresh for every `now` in `[T, T + threshold)`
    ///
    /// Timestamps in the future (clock skew) count as fresh.
    #[must_use]
    pub fn is_fresh(&self, last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_success {
            Some(at) => now < at + self.threshold(),
            None => false,
        }
    }

    /// Whether `(company, source)` should be fetched again at `now`
    pub fn should_scrape_at(
        &self,
        store: &dyn SalaryStore,
        company: &str,
        source: Source,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let last = store.last_successful_scrape(company, source)?;
        let fresh = self.is_fresh(last, now);

        if fresh {
            tracing::debug!(
                company = %company,
                source = %source,
                last_success = ?last,
                threshold_hours = self.threshold_hours,
                "Recently scraped"
            );
        }

        Ok(!fresh)
    }

    /// Whether `(company, source)` should be fetched again now
    pub fn should_scrape(
        &self,
        store: &dyn SalaryStore,
        company: &str,
        source: Source,
    ) -> Result<bool> {
        self.should_scrape_at(store, company, source, Utc::now())
    }
}

impl Default for FreshnessGate {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS_HOURS)
    }
}
