//! Per-source normalization into [`SalaryRecord`]s
//!
//! Each source gets typed payload structs. Every optional field has an explicit
//! fallback:
//!
//! | Variant    | Field                | Fallback                  |
//! |------------|----------------------|---------------------------|
//! | Leveling   | `primaryLevelName`   | `"Unknown"`               |
//! | Leveling   | `rawValues.*`        | `0`                       |
//! | Leveling   | exchange rate        | `1`                       |
//! | Leveling   | `location`           | query region              |
//! | Leveling   | `numDataPoints`      | `1`                       |
//! | Aggregator | observation `role`   | bucket `role`             |
//! | Aggregator | bucket `role`        | `"Unknown Role"`          |
//! | Aggregator | `salary`             | absent (not fabricated)   |
//! | Aggregator | `location`           | query region              |
//!
//! List entries that are not objects are dropped, and a non-object
//! `rawValues` or `salaryData` counts as absent. Only missing structural containers (`props`, `pageProps`) are errors.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::{CompanyId, CompensationBreakdown, ParserVariant, SalaryRecord, Source};
use crate::parser::embedded::SNIPPET_LEN;
use crate::utils::error::ParseError;
use crate::utils::{non_blank, truncate_text};

pub const UNKNOWN_LEVEL: &str = "Unknown";
pub const UNKNOWN_ROLE: &str = "Unknown Role";

/// Immutable per-call parameters shared by every record of one scrape
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub company_id: CompanyId,
    pub company_name: &'a str,
    pub source: Source,
    pub source_url: &'a str,
    pub region: &'a str,
    pub captured_at: DateTime<Utc>,
}

impl NormalizeContext<'_> {
    fn record(
        &self,
        designation: String,
        location: String,
        compensation: CompensationBreakdown,
    ) -> SalaryRecord {
        SalaryRecord {
            company_id: self.company_id,
            company_name: self.company_name.to_string(),
            designation,
            level: None,
            role_category: None,
            location,
            source: self.source,
            compensation,
            years_of_experience: None,
            data_points: 1,
            source_url: self.source_url.to_string(),
            captured_at: self.captured_at,
        }
    }
}

/// Normalize a decoded payload with the given variant
///
/// # Errors
///
/// Returns `ParseError::MalformedPayload` when the structural containers are
/// missing or have the wrong type
pub fn normalize(
    variant: ParserVariant,
    payload: &Value,
    ctx: &NormalizeContext<'_>,
) -> Result<Vec<SalaryRecord>, ParseError> {
    match variant {
        ParserVariant::Leveling => normalize_leveling(payload, ctx),
        ParserVariant::Aggregator => normalize_aggregator(payload, ctx),
    }
}

// ============================================================================
// Payload shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct NextData<P> {
    props: Props<P>,
}

#[derive(Debug, Deserialize)]
struct Props<P> {
    #[serde(rename = "pageProps")]
    page_props: P,
}

fn page_props<'de, P: Deserialize<'de>>(payload: &'de Value) -> Result<P, ParseError> {
    NextData::<P>::deserialize(payload)
        .map(|data| data.props.page_props)
        .map_err(|e| {
            ParseError::malformed(
                e.to_string(),
                truncate_text(&payload.to_string(), SNIPPET_LEN),
            )
        })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LevelingPage {
    #[serde(default, deserialize_with = "lenient_list")]
    averages: Option<Vec<LevelAverage>>,
    #[serde(default, deserialize_with = "lenient_f64")]
    location_exchange_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LevelAverage {
    #[serde(default, deserialize_with = "lenient_string")]
    primary_level_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    secondary_level_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    raw_values: Option<RawValues>,
    #[serde(default, deserialize_with = "lenient_f64")]
    years_of_experience: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    location: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    num_data_points: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawValues {
    #[serde(default, deserialize_with = "lenient_f64")]
    base: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    bonus: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    stock: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatorPage {
    #[serde(default, deserialize_with = "lenient_object")]
    salary_data: Option<SalaryData>,
}

#[derive(Debug, Default, Deserialize)]
struct SalaryData {
    #[serde(default, deserialize_with = "lenient_list")]
    roles: Option<Vec<RoleBucket>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleBucket {
    #[serde(default, deserialize_with = "lenient_string")]
    role: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    individual_salaries: Option<Vec<Observation>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Observation {
    #[serde(default, deserialize_with = "lenient_string")]
    role: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    years_of_experience: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    salary: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    location: Option<String>,
}

/// An object node; any other shape is absent
fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(decode_object))
}

/// A list of object nodes; entries of any other shape are dropped
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(items.into_iter().filter_map(decode_object).collect()),
        _ => None,
    })
}

fn decode_object<T: DeserializeOwned>(value: Value) -> Option<T> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Numbers, numeric strings ("12,00,000" included) or absent
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

/// Strings, or numbers rendered as strings; anything else is absent
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ============================================================================
// Leveling: per-level averages
// ============================================================================

/// `"primary (secondary)"`, or the primary label alone
pub fn designation(primary: &str, secondary: Option<&str>) -> String {
    match secondary {
        Some(secondary) => format!("{primary} ({secondary})"),
        None => primary.to_string(),
    }
}

/// Normalize a leveling-site payload
///
/// # Errors
///
/// Returns `ParseError::MalformedPayload` if `props.pageProps` is missing
pub fn normalize_leveling(
    payload: &Value,
    ctx: &NormalizeContext<'_>,
) -> Result<Vec<SalaryRecord>, ParseError> {
    let page: LevelingPage = page_props(payload)?;
    let rate = page.location_exchange_rate.unwrap_or(1.0);

    let records = page
        .averages
        .unwrap_or_default()
        .into_iter()
        .map(|entry| {
            let primary = non_blank(entry.primary_level_name.as_deref())
                .unwrap_or_else(|| UNKNOWN_LEVEL.to_string());
            let secondary = non_blank(entry.secondary_level_name.as_deref());
            let raw = entry.raw_values.unwrap_or_default();
            let convert = |v: Option<f64>| Some(v.unwrap_or(0.0) * rate);

            let compensation = CompensationBreakdown {
                base: convert(raw.base),
                bonus: convert(raw.bonus),
                stock: convert(raw.stock),
                total: convert(raw.total),
            };

            let location =
                non_blank(entry.location.as_deref()).unwrap_or_else(|| ctx.region.to_string());

            let mut record = ctx.record(
                designation(&primary, secondary.as_deref()),
                location,
                compensation,
            );
            record.level = Some(primary);
            record.years_of_experience = entry.years_of_experience;
            record.data_points = entry
                .num_data_points
                .map_or(1, |n| n.max(0.0).round() as u32);
            record
        })
        .collect();

    Ok(records)
}

// ============================================================================
// Aggregator: role buckets of individual observations
// ============================================================================

/// Normalize an aggregator-site payload
///
/// # Errors
///
/// Returns `ParseError::MalformedPayload` if `props.pageProps` is missing
pub fn normalize_aggregator(
    payload: &Value,
    ctx: &NormalizeContext<'_>,
) -> Result<Vec<SalaryRecord>, ParseError> {
    let page: AggregatorPage = page_props(payload)?;

    let buckets = page
        .salary_data
        .and_then(|data| data.roles)
        .unwrap_or_default();

    let mut records = Vec::new();
    for bucket in buckets {
        let role_name =
            non_blank(bucket.role.as_deref()).unwrap_or_else(|| UNKNOWN_ROLE.to_string());

        for observation in bucket.individual_salaries.unwrap_or_default() {
            let title =
                non_blank(observation.role.as_deref()).unwrap_or_else(|| role_name.clone());
            let location = non_blank(observation.location.as_deref())
                .unwrap_or_else(|| ctx.region.to_string());

            let mut record = ctx.record(
                title,
                location,
                CompensationBreakdown::total_only(observation.salary),
            );
            record.role_category = Some(role_name.clone());
            record.years_of_experience = observation.years_of_experience;
            records.push(record);
        }
    }

    Ok(records)
}
