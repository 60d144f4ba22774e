//! Total value coercions for raw spreadsheet scalars.
//!
//! None of these functions fail: they return either a typed value or
//! [`Coerced::Invalid`], and the caller decides whether an invalid value
//! contributes zero, defaults to one, or is dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::data::RawValue;

pub const NAME_PLACEHOLDER: &str = "Unknown";
pub const CONTACT_PLACEHOLDER: &str = "-";

/// Outcome of coercing one raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
    Valid(T),
    Invalid,
}

impl<T> Coerced<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            Coerced::Valid(value) => Some(value),
            Coerced::Invalid => None,
        }
    }

    pub fn unwrap_or(self, fallback: T) -> T {
        self.valid().unwrap_or(fallback)
    }
}

impl<T> From<Option<T>> for Coerced<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Coerced::Invalid, Coerced::Valid)
    }
}

fn parse_grouped_number(text: &str) -> Option<f64> {
    let stripped = text.trim().replace(',', "");
    if stripped.is_empty() {
        return None;
    }
    stripped.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Monetary amount. Grouping commas are stripped; anything else that is not
/// a finite float is invalid.
pub fn to_amount(raw: &RawValue) -> Coerced<f64> {
    match raw {
        RawValue::Null => Coerced::Invalid,
        RawValue::Number(value) if value.is_finite() => Coerced::Valid(*value),
        RawValue::Number(_) => Coerced::Invalid,
        RawValue::String(text) => parse_grouped_number(text).into(),
    }
}

/// Quantity, parsed like an amount.
pub fn to_quantity(raw: &RawValue) -> Coerced<f64> {
    to_amount(raw)
}

/// Quantity used as a multiplier: an invalid quantity counts as one unit.
pub fn quantity_or_single_unit(raw: Option<&RawValue>) -> f64 {
    raw.map(to_quantity).map_or(1.0, |quantity| quantity.unwrap_or(1.0))
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%m-%d-%Y", "%Y-%m-%d", "%d-%m-%Y"];

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(parsed.date());
        }
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(parsed);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Calendar date. Tries ISO-8601 with a time component, ISO-8601 date,
/// `MM-DD-YYYY`, `YYYY-MM-DD`, then `DD-MM-YYYY`; the first that parses wins.
pub fn to_date(raw: &RawValue) -> Coerced<NaiveDate> {
    match raw {
        RawValue::String(text) => parse_date_text(text).into(),
        RawValue::Null | RawValue::Number(_) => Coerced::Invalid,
    }
}

/// Trimmed display text, or `placeholder` for null and blank values.
pub fn to_display_string(raw: Option<&RawValue>, placeholder: &str) -> String {
    raw.and_then(RawValue::as_text)
        .unwrap_or_else(|| placeholder.to_string())
}

/// Trims and collapses inner whitespace runs to a single space.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
