//! Small pure text helpers for question content and option labels.

/// Separator used when options are flattened into a single field.
pub const OPTION_SEPARATOR: char = '|';

/// Stand-in for a literal [`OPTION_SEPARATOR`] inside an option label.
pub const SEPARATOR_SUBSTITUTE: char = '_';

/// Markers that open the attribution clause appended to quiz questions.
const ATTRIBUTION_MARKERS: [&str; 2] = ["(出题单位", "（出题单位"];

/// Normalize raw question text into the form used as the dedup key.
///
/// Non-breaking spaces count as whitespace, whitespace runs collapse to a
/// single space, and a trailing attribution clause is removed.
#[must_use]
pub fn normalize_content(raw: &str) -> String {
    let collapsed = raw
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    strip_attribution(&collapsed).trim_end().to_string()
}

/// Drop everything from the first attribution marker onwards.
#[must_use]
pub fn strip_attribution(content: &str) -> &str {
    ATTRIBUTION_MARKERS
        .iter()
        .filter_map(|marker| content.find(marker))
        .min()
        .map_or(content, |cut| &content[..cut])
}

/// Make an option label safe for pipe-joined serialization.
///
/// Empty labels become a single space, matching what the device reports
/// for blank options.
#[must_use]
pub fn sanitize_option(raw: &str) -> String {
    let label = raw
        .replace('\u{a0}', " ")
        .replace(OPTION_SEPARATOR, &SEPARATOR_SUBSTITUTE.to_string());
    if label.is_empty() {
        " ".to_string()
    } else {
        label
    }
}

/// Truncate a string to a maximum number of characters, adding `...` if needed.
#[must_use]
pub fn truncate_with_ellipsis(raw: &str, max: usize) -> String {
    let raw = raw.trim();
    let max = max.max(3);
    if raw.chars().count() <= max {
        return raw.to_string();
    }
    let head: String = raw.chars().take(max - 3).collect();
    format!("{head}...")
}
