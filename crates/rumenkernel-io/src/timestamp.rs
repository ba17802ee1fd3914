//! Timestamp parsing for logger exports.

use chrono::NaiveDateTime;

/// Accepted timestamp layouts, tried in order.
pub const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Layout used when writing timestamps.
pub const OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp cell, returning `None` when no layout matches.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Render a timestamp in the output layout.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(OUTPUT_FORMAT).to_string()
}
