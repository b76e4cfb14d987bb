//! Field normalization rules.
//!
//! Each field has one documented default for "element absent": empty string
//! for text fields, 0 for counts. The functions here only deal with values
//! that were actually found.

use tracing::warn;
use url::Url;

/// Trims surrounding whitespace.
pub fn clean_text(raw: &str) -> String {
    raw.trim().to_string()
}

/// Formats a raw price as `$1,234.56`.
///
/// Everything except ASCII digits and `.` is stripped before parsing. When
/// what remains is not a number, the raw text comes back trimmed but
/// otherwise untouched.
pub fn format_price(raw: &str) -> String {
    let numeric: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();

    match numeric.parse::<f64>() {
        Ok(value) if value.is_finite() => format_currency(value),
        _ => raw.trim().to_string(),
    }
}

/// `$` + comma-grouped integer part + two decimals. A negative amount
/// keeps its sign in front of the `$`.
fn format_currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, group_thousands(int_part), frac_part)
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Parses an integer field, falling back to 0 on malformed input.
pub fn parse_count(field: &str, raw: &str) -> i64 {
    let trimmed = raw.trim();
    match trimmed.parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            warn!("Malformed {} value '{}', using 0", field, trimmed);
            0
        }
    }
}

/// Makes a product link absolute.
///
/// `http`/`https` links pass through unchanged, protocol-relative links take
/// the origin's scheme, anything else is appended to the origin.
pub fn resolve_url(origin: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }

    if let Ok(url) = Url::parse(href) {
        if matches!(url.scheme(), "http" | "https") {
            return href.to_string();
        }
    }

    if let Some(rest) = href.strip_prefix("//") {
        let scheme = origin.split_once("://").map(|(s, _)| s).unwrap_or("https");
        return format!("{}://{}", scheme, rest);
    }

    format!("{}/{}", origin.trim_end_matches('/'), href.trim_start_matches('/'))
}

/// First `max_chars` characters of `text`, for log excerpts.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
