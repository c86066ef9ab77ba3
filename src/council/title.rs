//! Conversation title cleanup.

use crate::conversations::types::DEFAULT_TITLE;

/// Longest title kept verbatim.
pub const MAX_TITLE_CHARS: usize = 50;

/// Normalize a model-generated or user-provided title.
///
/// Surrounding whitespace and quotes are stripped. Empty input yields
/// [`DEFAULT_TITLE`]; anything longer than [`MAX_TITLE_CHARS`] is cut to
/// 47 characters followed by `...`.
#[must_use]
pub fn clean_title(raw: &str) -> String {
    let title = raw.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();

    if title.is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    if title.chars().count() > MAX_TITLE_CHARS {
        let mut truncated: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        truncated.push_str("...");
        return truncated;
    }

    title.to_string()
}
