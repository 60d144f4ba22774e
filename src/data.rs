//! Raw record model handed over by a row store.
//!
//! A [`Record`] is an immutable, ordered mapping from trimmed source column
//! names to [`RawValue`] scalars. Records produced from the same file share a
//! single [`Header`] so column lookup is a hash probe rather than a scan.
//!
//! Three states are kept apart on lookup: the column is *missing* from the
//! record (`None`), present but *null* (`Some(RawValue::Null)`), or present
//! with a value whose normalization may still turn out invalid.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Number(f64),
    String(String),
}

impl RawValue {
    /// True for null values and strings that are empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::String(s) => s.trim().is_empty(),
            RawValue::Number(_) => false,
        }
    }

    /// Trimmed textual form, `None` when blank.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Null => None,
            RawValue::Number(n) => Some(format_number(*n)),
            RawValue::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Null)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => Ok(()),
            RawValue::Number(n) => f.write_str(&format_number(*n)),
            RawValue::String(s) => f.write_str(s),
        }
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Ordered column names of a file, shared by all of its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    /// Builds a header from raw names. Names are trimmed; when two columns
    /// trim to the same name the first one wins lookups.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .collect::<Vec<_>>();
        let mut index = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(idx);
        }
        Self { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    header: Arc<Header>,
    values: Vec<RawValue>,
}

impl Record {
    /// Pairs `values` positionally with `header`. Short rows are padded with
    /// nulls and surplus values are dropped.
    pub fn new(header: Arc<Header>, mut values: Vec<RawValue>) -> Self {
        values.resize(header.len(), RawValue::Null);
        Self { header, values }
    }

    /// Convenience constructor for a record with its own header.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RawValue>,
    {
        let (names, values): (Vec<String>, Vec<RawValue>) = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .unzip();
        Self::new(Arc::new(Header::new(names)), values)
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.header
            .position(column.trim())
            .and_then(|idx| self.values.get(idx))
    }

    /// Trimmed text of `column`; `None` for missing, null or blank cells.
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(RawValue::as_text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.header
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Union of the columns of `records`, in first-seen file order.
pub fn available_columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let mut seen_headers: Vec<&Arc<Header>> = Vec::new();
    for record in records {
        let header = record.header();
        if seen_headers.iter().any(|known| Arc::ptr_eq(known, header)) {
            continue;
        }
        seen_headers.push(header);
        for name in header.names() {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
    }
    columns
}
