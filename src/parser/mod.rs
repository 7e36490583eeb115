//! Embedded payload extraction and normalization
//!
//! Pages are never scraped for visible markup. [`embedded`] pulls the JSON
//! hydration block out of the document and [`normalize`](mod@normalize) maps
//! each source's payload shape onto [`SalaryRecord`](crate::models::SalaryRecord).

pub mod embedded;
pub mod normalize;

pub use embedded::{extract_embedded, find_embedded_block};
pub use normalize::{normalize, normalize_aggregator, normalize_leveling, NormalizeContext};
