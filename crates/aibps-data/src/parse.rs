//! Field parsing shared by the file-backed sources

use crate::error::{DataError, Result};
use chrono::NaiveDate;

/// Cell contents read as a missing value.
///
/// FRED exports use `.` for missing observations.
pub const MISSING_SENTINELS: &[&str] = &[
    "", ".", "NA", "N/A", "#N/A", "NaN", "nan", "null", "None",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a date cell.
///
/// Accepts ISO dates, `YYYY/MM/DD`, `MM/DD/YYYY`, a bare `YYYY-MM`
/// (first of the month) and ISO datetimes, whose time part is ignored.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let day_part = trimmed
        .split(['T', ' '])
        .next()
        .unwrap_or(trimmed);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day_part, fmt).ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("{day_part}-01"), "%Y-%m-%d").ok())
        .ok_or_else(|| DataError::Parse(format!("Unrecognized date: {raw:?}")))
}

/// Parse a value cell, coercing sentinels and garbage to missing.
pub fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if MISSING_SENTINELS.contains(&trimmed) {
        return None;
    }
    trimmed
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
