//! Source registry: maps a source tag to its URL template

use std::collections::HashMap;

use crate::models::Source;
use crate::utils::error::ScrapeError;

/// Placeholder replaced with the lower-cased company name
pub const COMPANY_PLACEHOLDER: &str = "{company}";

/// Element id of the embedded hydration block on every registered site
pub const NEXT_DATA_MARKER: &str = "__NEXT_DATA__";

/// Region reported when a source does not carry a location
pub const DEFAULT_REGION: &str = "India";

const LEVELS_FYI_TEMPLATE: &str =
    "https://www.levels.fyi/companies/{company}/salaries/software-engineer/locations/india?country=113";
const WEEKDAY_TEMPLATE: &str = "https://www.weekday.works/salary/what-salary-does-{company}-pay";
const AMBITIONBOX_TEMPLATE: &str = "https://www.ambitionbox.com/salaries/{company}-salaries";

/// Registry of URL templates per source
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    templates: HashMap<Source, String>,
}

impl SourceRegistry {
    /// Registry with the built-in templates
    #[must_use]
    pub fn new() -> Self {
        let templates = Source::all()
            .into_iter()
            .map(|source| (source, default_template(source).to_string()))
            .collect();
        Self { templates }
    }

    /// Empty registry; every lookup fails until templates are added
    #[must_use]
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Register or replace the template for a source
    #[must_use]
    pub fn with_template(mut self, source: Source, template: impl Into<String>) -> Self {
        self.templates.insert(source, template.into());
        self
    }

    /// Resolve a source tag and company name into a URL
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::UnknownSource` if the tag is not a known source or
    /// has no template registered
    pub fn resolve(&self, source: &str, company: &str) -> Result<String, ScrapeError> {
        let source: Source = source.parse()?;
        self.resolve_source(source, company)
    }

    /// Resolve an already-parsed source
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::UnknownSource` if no template is registered
    pub fn resolve_source(&self, source: Source, company: &str) -> Result<String, ScrapeError> {
        let template = self
            .templates
            .get(&source)
            .ok_or_else(|| ScrapeError::UnknownSource(source.to_string()))?;

        Ok(template.replace(COMPANY_PLACEHOLDER, &company_slug(company)))
    }

    pub fn is_registered(&self, source: Source) -> bool {
        self.templates.contains_key(&source)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn default_template(source: Source) -> &'static str {
    match source {
        Source::LevelsFyi => LEVELS_FYI_TEMPLATE,
        Source::Weekday => WEEKDAY_TEMPLATE,
        Source::Ambitionbox => AMBITIONBOX_TEMPLATE,
    }
}

/// Company identifier as it appears in source URLs
pub fn company_slug(company: &str) -> String {
    company.trim().to_lowercase()
}
