//! Human readable byte sizes

use crate::rating::WORST_THRESHOLD_KB;

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format bytes as a human readable string
///
/// Bytes and kilobytes are rounded to whole numbers, larger units keep up
/// to two decimals with trailing zeros trimmed ("5 MB", "5.2 MB", "5.56 MB").
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let decimals = if unit > 1 { 2 } else { 0 };
    let formatted = format!("{:.*}", decimals, value);
    let trimmed = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };

    format!("{} {}", trimmed, UNITS[unit])
}

/// Format a signed byte delta, e.g. "-12 KB"
pub fn format_signed_bytes(bytes: i64) -> String {
    let magnitude = format_bytes(bytes.unsigned_abs());
    if bytes < 0 {
        format!("-{}", magnitude)
    } else {
        magnitude
    }
}

/// Scale factor for summary bars, linear from 1 at 0 KB to `max_factor`
/// at the F threshold
pub fn size_factor(bytes: u64, max_factor: f64) -> f64 {
    let kb = bytes as f64 / 1024.0;
    let factor = 1.0 + (kb / WORST_THRESHOLD_KB) * (max_factor - 1.0);
    factor.clamp(1.0, max_factor.max(1.0))
}
