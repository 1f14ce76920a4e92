// Parsing and formatting helpers.
//
// The open-data feed is messy: amounts arrive as plain decimals or in the
// Italian "1.234,56" form, dates come in several shapes, and codes are
// sometimes numbers and sometimes strings. Everything here degrades to a
// neutral value instead of failing.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a funding amount, falling back to `0.0` for anything unusable.
///
/// - Trims whitespace and a leading/trailing euro sign.
/// - A comma means Italian formatting: `.` groups thousands, `,` is decimal.
/// - Non-finite results (`NaN`, `inf`) count as unusable.
pub fn parse_amount(raw: &str) -> f64 {
    parse_f64_safe(Some(raw)).unwrap_or(0.0)
}

pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim().trim_matches('€').trim();
    if s.is_empty() {
        return None;
    }
    let parsed = if s.contains(',') {
        s.replace('.', "").replace(',', ".").parse::<f64>().ok()
    } else {
        s.parse::<f64>().ok()
    };
    parsed.filter(|v| v.is_finite())
}

pub fn parse_u64_safe(s: Option<&str>) -> Option<u64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<u64>().ok()
}

/// Dates in the feed are usually ISO (`2023-05-17` or with a time part) but
/// Italian `dd/mm/yyyy` also shows up.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Format with a fixed number of decimals and Italian digit grouping
/// (`1.234.567,89`).
pub fn format_number(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::it);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push(',');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::it)
}

/// Accept a JSON string or number (or null) and yield its text form. The
/// geographic source is not consistent about quoting codes.
pub fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Amounts are numbers in compact snapshots but raw text in the legacy schema.
pub fn de_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_amount(&s),
        _ => 0.0,
    })
}
