//! Column profiling for mapping suggestions.
//!
//! Every column of a file is reduced to a [`ColumnSample`]: the value shape
//! most of its cells share, a handful of distinct example values, and its
//! cardinality. Placeholder tokens such as `n/a` or `--` are ignored.

use std::{
    collections::HashSet,
    fmt,
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    data::{Record, available_columns},
    normalize::{Coerced, to_amount},
};

/// Share of non-empty values that must agree for a column to take a shape.
pub const SHAPE_THRESHOLD: f64 = 0.8;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern")
});
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[\d\s\-().]+$").expect("phone pattern")
});
static DATE_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}[-/.]\d{1,2}[-/.]\d{1,2}|\d{1,2}[-/.]\d{1,2}[-/.](\d{4}|\d{2}))([T ].*)?$")
        .expect("date pattern")
});
static INTEGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(\d{1,3}(,\d{3})+|\d+)$").expect("integer pattern")
});
static ID_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-#]{1,23}$").expect("identifier pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Empty,
    Integer,
    Decimal,
    Date,
    Email,
    Phone,
    Identifier,
    Text,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Empty => "empty",
            ValueKind::Integer => "integer",
            ValueKind::Decimal => "decimal",
            ValueKind::Date => "date",
            ValueKind::Email => "email",
            ValueKind::Phone => "phone",
            ValueKind::Identifier => "identifier",
            ValueKind::Text => "text",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueKind::Integer | ValueKind::Decimal)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSample {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub sample_values: Vec<String>,
    pub cardinality: usize,
    pub non_empty: usize,
}

impl ColumnSample {
    /// Profiles a column from its textual values.
    pub fn from_values<I, S>(name: &str, values: I, sample_values: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidate = KindCandidate::default();
        let mut distinct = HashSet::new();
        let mut samples = Vec::new();
        for value in values {
            let trimmed = value.as_ref().trim();
            if trimmed.is_empty() || is_placeholder_token(&trimmed.to_lowercase()) {
                continue;
            }
            candidate.update(trimmed);
            if distinct.insert(trimmed.to_string()) && samples.len() < sample_values {
                samples.push(trimmed.to_string());
            }
        }
        Self {
            name: name.trim().to_string(),
            kind: candidate.decide(),
            sample_values: samples,
            cardinality: distinct.len(),
            non_empty: candidate.non_empty,
        }
    }

    /// Distinct values per non-empty value; 1.0 means every value is unique.
    pub fn uniqueness(&self) -> f64 {
        if self.non_empty == 0 {
            0.0
        } else {
            self.cardinality as f64 / self.non_empty as f64
        }
    }
}

#[derive(Debug, Default)]
struct KindCandidate {
    non_empty: usize,
    integer_matches: usize,
    decimal_matches: usize,
    date_matches: usize,
    email_matches: usize,
    phone_matches: usize,
    identifier_matches: usize,
}

impl KindCandidate {
    fn update(&mut self, value: &str) {
        self.non_empty += 1;
        if EMAIL.is_match(value) {
            self.email_matches += 1;
            return;
        }
        if DATE_LIKE.is_match(value) {
            self.date_matches += 1;
            return;
        }
        if looks_like_phone(value) {
            self.phone_matches += 1;
            return;
        }
        if INTEGER.is_match(value) {
            self.integer_matches += 1;
            self.identifier_matches += 1;
            return;
        }
        if let Coerced::Valid(_) = to_amount(&value.into()) {
            self.decimal_matches += 1;
            return;
        }
        let guid = value.trim_matches(|c| matches!(c, '{' | '}'));
        if Uuid::parse_str(guid).is_ok()
            || (ID_LIKE.is_match(value) && value.chars().any(|c| c.is_ascii_digit()))
        {
            self.identifier_matches += 1;
        }
    }

    fn meets(&self, count: usize) -> bool {
        count > 0 && count as f64 >= self.non_empty as f64 * SHAPE_THRESHOLD
    }

    fn decide(&self) -> ValueKind {
        if self.non_empty == 0 {
            ValueKind::Empty
        } else if self.meets(self.email_matches) {
            ValueKind::Email
        } else if self.meets(self.date_matches) {
            ValueKind::Date
        } else if self.meets(self.phone_matches) {
            ValueKind::Phone
        } else if self.meets(self.integer_matches) {
            ValueKind::Integer
        } else if self.decimal_matches > 0 && self.meets(self.integer_matches + self.decimal_matches) {
            ValueKind::Decimal
        } else if self.meets(self.identifier_matches) {
            ValueKind::Identifier
        } else {
            ValueKind::Text
        }
    }
}

/// 7 to 15 digits (any script) with phone punctuation, and either a leading
/// `+`/`0` or a separator, so plain amounts are not mistaken for numbers.
fn looks_like_phone(value: &str) -> bool {
    if !PHONE.is_match(value) {
        return false;
    }
    let digits = value.chars().filter(|c| c.is_numeric()).count();
    if !(7..=15).contains(&digits) {
        return false;
    }
    let leading = value.starts_with('+') || value.starts_with('0') || value.starts_with('٠');
    let separated = value.contains([' ', '-', '(', ')']);
    leading || separated
}

fn is_placeholder_token(lowered: &str) -> bool {
    matches!(
        lowered,
        "na" | "n/a" | "null" | "none" | "unknown" | "missing" | "-"
    ) || lowered.chars().all(|c| c == '-')
}

/// Profiles every column of `records` in file order, keeping up to
/// `sample_values` distinct examples per column.
pub fn profile_columns(records: &[Record], sample_values: usize) -> Vec<ColumnSample> {
    available_columns(records)
        .iter()
        .map(|column| {
            let values = records
                .iter()
                .filter_map(|record| record.text(column));
            ColumnSample::from_values(column, values, sample_values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(values: &[&str]) -> ValueKind {
        ColumnSample::from_values("c", values.iter().copied(), 3).kind
    }

    #[test]
    fn shapes_are_detected_by_majority() {
        assert_eq!(kind_of(&["a@b.co", "x@y.org", "bad"]), ValueKind::Text);
        assert_eq!(
            kind_of(&["a@b.co", "x@y.org", "c@d.net", "e@f.io", "oops"]),
            ValueKind::Email
        );
        assert_eq!(kind_of(&["2024-01-05", "05/01/2024"]), ValueKind::Date);
        assert_eq!(kind_of(&["0501234567", "+966 50 123 4567"]), ValueKind::Phone);
        assert_eq!(kind_of(&["12", "1,000", "7"]), ValueKind::Integer);
        assert_eq!(kind_of(&["12.5", "1,000", "7"]), ValueKind::Decimal);
        assert_eq!(kind_of(&["SKU-001", "SKU-002"]), ValueKind::Identifier);
        assert_eq!(kind_of(&["Riyadh", "Jeddah"]), ValueKind::Text);
        assert_eq!(kind_of(&["", "n/a", "--"]), ValueKind::Empty);
    }

    #[test]
    fn value_shape_variants() {
        let cases: &[(&[&str], ValueKind)] = &[
            (&["966-55-1234567", "966-50-7654321"], ValueKind::Phone),
            (&["050 123 4567", "055 987 6543"], ValueKind::Phone),
            (&["+966 55 123 4567", "+966-50-765-4321"], ValueKind::Phone),
            (&["(050) 123-4567", "050.123.4567"], ValueKind::Phone),
            (&["2024-01-05", "2024/1/5"], ValueKind::Date),
            (&["05-01-2024", "5.1.2024", "31/12/24"], ValueKind::Date),
            (&["2024-01-05T08:30:00", "2024-01-06 17:45"], ValueKind::Date),
            (&["1001", "1002", "1003"], ValueKind::Integer),
            (&["INV-1001", "INV-1002"], ValueKind::Identifier),
        ];
        for (values, expected) in cases {
            assert_eq!(kind_of(values), *expected, "{values:?}");
        }
    }

    #[test]
    fn arabic_indic_digits_count_toward_phone_numbers() {
        assert_eq!(kind_of(&["٠٥٠١٢٣٤٥٦٧", "٠٥٥٩٨٧٦٥٤٣"]), ValueKind::Phone);
    }

    #[test]
    fn plain_amounts_are_not_phone_numbers() {
        assert_eq!(kind_of(&["1250000", "9800000"]), ValueKind::Integer);
    }

    #[test]
    fn samples_are_distinct_and_capped() {
        let sample = ColumnSample::from_values("City", ["Riyadh", "Riyadh", "Jeddah", "Dammam", "Abha"], 2);
        assert_eq!(sample.sample_values, vec!["Riyadh", "Jeddah"]);
        assert_eq!(sample.cardinality, 4);
        assert_eq!(sample.non_empty, 5);
    }

    #[test]
    fn profile_columns_follows_file_order() {
        let records = vec![
            Record::from_pairs([("Name", "Ann"), ("Email", "ann@example.com")]),
            Record::from_pairs([("Name", "Bob"), ("Email", "")]),
        ];
        let samples = profile_columns(&records, 5);
        assert_eq!(samples[0].name, "Name");
        assert_eq!(samples[1].kind, ValueKind::Email);
        assert_eq!(samples[1].non_empty, 1);
    }
}
