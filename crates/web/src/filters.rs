//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use chrono::{DateTime, NaiveDate};

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats an ISO-8601 timestamp as `YYYY-MM-DD`.
///
/// Text that is not a timestamp or date is passed through unchanged.
///
/// Usage in templates: `{{ image.date|short_date }}`
#[askama::filter_fn]
pub fn short_date(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_short_date(&value.to_string()))
}

fn format_short_date(raw: &str) -> String {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_or_else(|_| raw.to_string(), |date| date.format("%Y-%m-%d").to_string())
}

/// Formats a byte count for display, e.g. `1.5 MB`.
///
/// Usage in templates: `{{ file.size|file_size }}`
#[askama::filter_fn]
pub fn file_size(bytes: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let bytes: u64 = bytes.to_string().parse().unwrap_or(0);
    Ok(format_file_size(bytes))
}

#[allow(clippy::cast_precision_loss)] // Display only
fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    match bytes {
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_date() {
        assert_eq!(format_short_date("2024-05-01T10:00:00.000Z"), "2024-05-01");
        assert_eq!(
            format_short_date("2024-05-01T23:30:00.000+00:00"),
            "2024-05-01"
        );
        assert_eq!(format_short_date("2024-05-01"), "2024-05-01");
        assert_eq!(format_short_date("last tuesday"), "last tuesday");
        assert_eq!(format_short_date(""), "");
    }

    #[test]
    fn test_file_size() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.0 MB");
    }
}
