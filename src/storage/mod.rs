//! Persistence for companies, scrape jobs and salary records
//!
//! [`repository`] holds the store trait and its SQLite and in-memory
//! backends; [`export`] handles the JSON files used in non-persistent mode.

pub mod export;
pub mod repository;

pub use export::{load_companies, write_salaries};
pub use repository::{
    create_memory_store, create_sqlite_store, MemorySalaryStore, SalaryStore, SharedSalaryStore,
    SqliteSalaryStore,
};

use std::path::Path;

/// Open the store for a run: in-memory when `dry_run`, SQLite otherwise
///
/// # Errors
///
/// Returns an error if the SQLite database cannot be opened
pub fn open_store(sqlite_path: &Path, dry_run: bool) -> anyhow::Result<SharedSalaryStore> {
    if dry_run {
        tracing::info!("Dry run: records are kept in memory only");
        return Ok(create_memory_store());
    }

    tracing::info!(path = %sqlite_path.display(), "Opening SQLite store");
    create_sqlite_store(sqlite_path)
}
