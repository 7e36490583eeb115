//! Embedded state extraction
//!
//! Server-rendered pages ship their hydration state as JSON inside a
//! `<script id="...">` element. That block is the only data source; the
//! visible HTML is never parsed.

use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;

use crate::utils::error::ParseError;
use crate::utils::truncate_text;

/// Longest raw snippet kept for diagnostics
pub const SNIPPET_LEN: usize = 200;

fn script_selector() -> &'static Selector {
    static SCRIPT: OnceLock<Selector> = OnceLock::new();
    SCRIPT.get_or_init(|| Selector::parse("script").expect("Invalid CSS selector: script"))
}

/// Raw text of the script element whose id is `marker`
pub fn find_embedded_block(document: &str, marker: &str) -> Option<String> {
    let html = Html::parse_document(document);

    html.select(script_selector())
        .find(|el| el.value().id() == Some(marker))
        .map(|el| el.text().collect::<String>())
}

/// Locate the block identified by `marker` and decode it as JSON
///
/// # Errors
///
/// - `ParseError::NoDataFound` when no element carries the marker id
/// - `ParseError::MalformedPayload` when the block is empty or not valid JSON
pub fn extract_embedded(document: &str, marker: &str) -> Result<Value, ParseError> {
    let raw = find_embedded_block(document, marker).ok_or_else(|| ParseError::NoDataFound {
        marker: marker.to_string(),
    })?;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::malformed(
            format!("{marker} block is empty"),
            String::new(),
        ));
    }

    serde_json::from_str(trimmed)
        .map_err(|e| ParseError::malformed(e.to_string(), truncate_text(trimmed, SNIPPET_LEN)))
}
