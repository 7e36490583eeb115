//! Company list input and JSON salary output
//!
//! Output shape, one key per company and one list per attempted source:
//!
//! ```json
//! {
//!   "Google": {
//!     "levels_fyi": [ { "designation": "L4", ... } ],
//!     "weekday": []
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::crawler::pipeline::CompanyReport;
use crate::error::{Error, Result};
use crate::models::SalaryRecord;

/// Company name to source tag to extracted records
pub type SalaryExport<'a> = BTreeMap<&'a str, BTreeMap<&'static str, &'a [SalaryRecord]>>;

/// Read a JSON array of company names
///
/// Names are trimmed; blanks and repeats are dropped, first occurrence wins.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON string array
pub fn load_companies(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    let names: Vec<String> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::CompaniesFile {
            path: path.to_path_buf(),
            source,
        })?;

    let mut seen = HashSet::new();
    let companies: Vec<String> = names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect();

    tracing::debug!(path = %path.display(), companies = companies.len(), "Loaded company list");
    Ok(companies)
}

/// Group extracted records by company and source
pub fn salary_export(reports: &[CompanyReport]) -> SalaryExport<'_> {
    reports
        .iter()
        .map(|report| {
            let by_source = report
                .outcomes
                .iter()
                .map(|(source, outcome)| (source.as_str(), outcome.records()))
                .collect();
            (report.company.as_str(), by_source)
        })
        .collect()
}

/// Write the JSON export, replacing `path` atomically
///
/// # Errors
///
/// Returns an error if the file cannot be written
pub fn write_salaries(path: &Path, reports: &[CompanyReport]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::file(parent, e))?;
    }

    let temp_path = path.with_extension("json.tmp");
    let file = File::create(&temp_path).map_err(|e| Error::file(&temp_path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &salary_export(reports))?;

    fs::rename(&temp_path, path).map_err(|e| Error::file(path, e))?;

    tracing::info!(path = %path.display(), companies = reports.len(), "Salary export written");
    Ok(())
}
