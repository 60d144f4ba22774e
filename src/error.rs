//! Hard failures raised by the engine.
//!
//! Bad tenant data never produces an [`EngineError`]: unresolvable columns,
//! unparsable values and absent files all degrade into empty or partial
//! results. Only catalog and plan misconfiguration, invalid identifiers and
//! store failures surface here.

use thiserror::Error;

use crate::catalog::AnalysisType;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Canonical field '{field}' ({analysis}) has an empty alias list")]
    EmptyAliases {
        field: String,
        analysis: AnalysisType,
    },
    #[error("Canonical field '{field}' is defined more than once for {analysis}")]
    DuplicateField {
        field: String,
        analysis: AnalysisType,
    },
    #[error("Canonical field '{field}' is not defined for {analysis}")]
    UnknownField {
        field: String,
        analysis: AnalysisType,
    },
    #[error("Date range start {start} is after end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    #[error("Invalid {kind} identifier '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },
    #[error("Store failure: {0:#}")]
    Store(anyhow::Error),
}
