//! Result shapes consumed by the rest of the product.
//!
//! Field names are part of the contract: callers serialize these structures
//! as JSON as-is.

use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use serde::Serialize;

/// Why a result is empty without being an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum EmptyReason {
    FileAbsent,
    MappingAbsent,
    RequiredFieldUnresolved { field: String },
    NoIdentityColumns,
    NoAmountColumns,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::FileAbsent => f.write_str("file not found"),
            EmptyReason::MappingAbsent => f.write_str("no column mapping for this file"),
            EmptyReason::RequiredFieldUnresolved { field } => {
                write!(f, "required field '{field}' could not be resolved")
            }
            EmptyReason::NoIdentityColumns => f.write_str("no identity column could be resolved"),
            EmptyReason::NoAmountColumns => f.write_str("no amount column could be resolved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarTotals {
    pub total: f64,
    pub row_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EmptyReason>,
}

impl ScalarTotals {
    pub fn empty(reason: EmptyReason) -> Self {
        Self {
            total: 0.0,
            row_count: 0,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub identity_display: String,
    pub count: u64,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<NaiveDate>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedList {
    pub rows: Vec<RankedRow>,
    /// Requested page size, or the number of entities when unbounded.
    pub limit_applied: usize,
    pub total_entities: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EmptyReason>,
}

impl RankedList {
    pub fn empty(reason: EmptyReason, limit: Option<usize>) -> Self {
        Self {
            rows: Vec::new(),
            limit_applied: limit.unwrap_or(0),
            total_entities: 0,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeRow {
    pub bucket_key: String,
    pub total_amount: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeBuckets {
    /// Ascending by `bucket_key`.
    pub rows: Vec<RangeRow>,
    /// Records considered, including those whose date could not be parsed.
    pub row_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EmptyReason>,
}

impl RangeBuckets {
    pub fn empty(reason: EmptyReason) -> Self {
        Self {
            rows: Vec::new(),
            row_count: 0,
            reason: Some(reason),
        }
    }
}
