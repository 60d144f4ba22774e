//! Column resolution: canonical field → physical spreadsheet column.
//!
//! [`resolve`] applies a strict precedence cascade for one field:
//!
//! 1. primary mapping, probed with every alias in catalog order;
//! 2. secondary mapping (another analysis type), same probing;
//! 3. first available column (file order) whose lower-cased name contains any
//!    alias as a substring;
//! 4. unresolved.
//!
//! Mapping hits are trusted as-is by [`resolve`]. [`ResolvedColumnSet::build`]
//! then verifies them against the file so that a set never carries a column
//! the records cannot contain.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::{
    catalog::{AnalysisType, CanonicalFieldSpec, Catalog},
    mapping::{ColumnMapping, MappingEntries, lookup},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", content = "column", rename_all = "snake_case")]
pub enum Resolution {
    ExactAlias(String),
    SecondaryAlias(String),
    HeuristicSubstring(String),
    Unresolved,
}

impl Resolution {
    pub fn column(&self) -> Option<&str> {
        match self {
            Resolution::ExactAlias(column)
            | Resolution::SecondaryAlias(column)
            | Resolution::HeuristicSubstring(column) => Some(column),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Resolution::ExactAlias(_) => "exact_alias",
            Resolution::SecondaryAlias(_) => "secondary_alias",
            Resolution::HeuristicSubstring(_) => "heuristic_substring",
            Resolution::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column() {
            Some(column) => write!(f, "{} ({})", column, self.strategy()),
            None => f.write_str(self.strategy()),
        }
    }
}

fn aliases(spec: &CanonicalFieldSpec) -> impl Iterator<Item = &str> {
    spec.aliases
        .iter()
        .map(|alias| alias.trim())
        .filter(|alias| !alias.is_empty())
}

fn mapped_column(spec: &CanonicalFieldSpec, entries: &MappingEntries) -> Option<String> {
    aliases(spec).find_map(|alias| lookup(entries, alias).map(str::to_string))
}

/// Resolves one canonical field. See the module documentation for the
/// precedence rules.
pub fn resolve(
    spec: &CanonicalFieldSpec,
    primary: &MappingEntries,
    secondary: Option<&MappingEntries>,
    available_columns: &[String],
) -> Resolution {
    if let Some(column) = mapped_column(spec, primary) {
        return Resolution::ExactAlias(column);
    }
    if let Some(column) = secondary.and_then(|entries| mapped_column(spec, entries)) {
        return Resolution::SecondaryAlias(column);
    }
    let lowered_aliases = aliases(spec).map(str::to_lowercase).collect::<Vec<_>>();
    available_columns
        .iter()
        .find(|column| {
            let lowered = column.to_lowercase();
            lowered_aliases
                .iter()
                .any(|alias| lowered.contains(alias.as_str()))
        })
        .map(|column| Resolution::HeuristicSubstring(column.clone()))
        .unwrap_or(Resolution::Unresolved)
}

/// A mapping entry whose target column is absent from the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingColumn {
    pub field: String,
    pub column: String,
}

/// Per-query resolution of every catalog field of one analysis type.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedColumnSet {
    analysis_type: AnalysisType,
    entries: Vec<(String, Resolution)>,
    dangling: Vec<DanglingColumn>,
}

impl ResolvedColumnSet {
    pub fn build(
        catalog: &Catalog,
        analysis_type: AnalysisType,
        primary: &ColumnMapping,
        secondary: Option<&ColumnMapping>,
        available_columns: &[String],
    ) -> Self {
        let mut entries = Vec::new();
        let mut dangling = Vec::new();
        for spec in catalog.fields(analysis_type) {
            let mut resolution = resolve(
                spec,
                &primary.entries,
                secondary.map(|mapping| &mapping.entries),
                available_columns,
            );
            if let Some(column) = resolution.column()
                && !available_columns.iter().any(|c| c == column)
            {
                warn!(
                    "Mapping for '{}' points at column '{}' which is not present in file '{}'",
                    spec.field_name, column, primary.file_id
                );
                dangling.push(DanglingColumn {
                    field: spec.field_name.clone(),
                    column: column.to_string(),
                });
                resolution = Resolution::Unresolved;
            }
            debug!("Resolved '{}' -> {}", spec.field_name, resolution);
            entries.push((spec.field_name.clone(), resolution));
        }
        Self {
            analysis_type,
            entries,
            dangling,
        }
    }

    /// Builds a set directly from resolutions, bypassing the catalog.
    pub fn from_resolutions<I>(analysis_type: AnalysisType, resolutions: I) -> Self
    where
        I: IntoIterator<Item = (String, Resolution)>,
    {
        Self {
            analysis_type,
            entries: resolutions.into_iter().collect(),
            dangling: Vec::new(),
        }
    }

    pub fn analysis_type(&self) -> AnalysisType {
        self.analysis_type
    }

    pub fn resolution(&self, field: &str) -> Option<&Resolution> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, resolution)| resolution)
    }

    pub fn column(&self, field: &str) -> Option<&str> {
        self.resolution(field).and_then(Resolution::column)
    }

    pub fn is_resolved(&self, field: &str) -> bool {
        self.column(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resolution)> {
        self.entries
            .iter()
            .map(|(field, resolution)| (field.as_str(), resolution))
    }

    pub fn dangling(&self) -> &[DanglingColumn] {
        &self.dangling
    }
}
