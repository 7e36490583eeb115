//! Text helpers shared by the parser and error reporting
//!
//! Error types and the retry helper live in submodules.

pub mod error;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Normalize a label, treating blank strings as absent
pub fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(normalize_whitespace).filter(|s| !s.is_empty())
}

/// Truncate text to a maximum number of characters
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
