//! Mapping suggestions: proposes canonical field → source column pairs with
//! a confidence score so tenants can author mappings faster.
//!
//! Providers only read column samples. They never write to a mapping store;
//! [`Suggestions::accepted`] hands the caller entries to persist.

pub mod external;
pub mod heuristic;
pub mod http;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    catalog::AnalysisType,
    mapping::{ColumnMapping, FileId, MappingEntries, TenantId},
};

pub use crate::profile::{ColumnSample, ValueKind};
pub use external::{Classifier, ExternalClassifierProvider, FallbackPolicy};
pub use heuristic::HeuristicProvider;
pub use http::HttpClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Heuristic,
    External,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Heuristic => f.write_str("heuristic"),
            ProviderKind::External => f.write_str("external"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSuggestion {
    pub canonical_field: String,
    pub source_column: Option<String>,
    pub confidence: f64,
    pub provider: ProviderKind,
}

impl MappingSuggestion {
    pub fn unmatched(field: &str, provider: ProviderKind) -> Self {
        Self {
            canonical_field: field.to_string(),
            source_column: None,
            confidence: 0.0,
            provider,
        }
    }
}

/// One suggestion per catalog field, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Suggestions(Vec<MappingSuggestion>);

impl Suggestions {
    pub fn new(items: Vec<MappingSuggestion>) -> Self {
        Self(items)
    }

    pub fn get(&self, field: &str) -> Option<&MappingSuggestion> {
        self.0.iter().find(|s| s.canonical_field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingSuggestion> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries whose confidence reaches `min_confidence`.
    pub fn accepted(&self, min_confidence: f64) -> MappingEntries {
        self.0
            .iter()
            .filter(|s| s.confidence >= min_confidence)
            .filter_map(|s| {
                s.source_column
                    .as_ref()
                    .map(|column| (s.canonical_field.clone(), column.clone()))
            })
            .collect()
    }

    /// Builds a mapping from the accepted entries.
    pub fn into_mapping(
        &self,
        tenant: TenantId,
        file: FileId,
        analysis: AnalysisType,
        min_confidence: f64,
    ) -> ColumnMapping {
        let mut mapping = ColumnMapping::new(tenant, file, analysis);
        mapping.entries = self.accepted(min_confidence);
        mapping
    }
}

impl IntoIterator for Suggestions {
    type Item = MappingSuggestion;
    type IntoIter = std::vec::IntoIter<MappingSuggestion>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

pub trait SuggestionProvider {
    fn kind(&self) -> ProviderKind;

    /// Suggests a column for every catalog field of `analysis`. Never fails:
    /// a field with no plausible column gets `None` and confidence `0.0`.
    fn suggest(&self, samples: &[ColumnSample], analysis: AnalysisType) -> Suggestions;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(field: &str, column: Option<&str>, confidence: f64) -> MappingSuggestion {
        MappingSuggestion {
            canonical_field: field.to_string(),
            source_column: column.map(str::to_string),
            confidence,
            provider: ProviderKind::Heuristic,
        }
    }

    #[test]
    fn accepted_filters_by_confidence_and_presence() {
        let suggestions = Suggestions::new(vec![
            suggestion("customer_name", Some("Name"), 1.0),
            suggestion("phone", Some("Contact"), 0.4),
            suggestion("email", None, 0.0),
        ]);
        let accepted = suggestions.accepted(0.5);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted.get("customer_name").map(String::as_str), Some("Name"));
    }

    #[test]
    fn suggestions_serialize_as_a_plain_list() {
        let suggestions = Suggestions::new(vec![suggestion("email", None, 0.0)]);
        let json = serde_json::to_value(&suggestions).expect("json");
        assert_eq!(
            json,
            serde_json::json!([{
                "canonical_field": "email",
                "source_column": null,
                "confidence": 0.0,
                "provider": "heuristic"
            }])
        );
    }
}
