//! Deterministic suggestion provider.
//!
//! Scores every (field, column) pair from the column name and the shape of
//! its sampled values, then assigns greedily by descending score so that a
//! column is suggested for at most one field.
//!
//! Scores:
//!
//! | evidence                                   | confidence                  |
//! |--------------------------------------------|-----------------------------|
//! | name equals an alias (case/snake-insensitive) | 1.0                      |
//! | name contains alias at position `p`        | 0.8 − 0.03·p, ±shape         |
//! | values only (email/phone/date/id/amount)   | 0.75 / 0.65 / 0.6 / 0.45 / 0.4 |
//!
//! A matching value shape adds 0.1 to a substring hit (capped at 0.95); a
//! contradicting one subtracts 0.3.

use heck::ToSnakeCase;
use log::debug;

use crate::{
    catalog::{AnalysisType, CanonicalFieldSpec, Catalog, FieldKind},
    profile::{ColumnSample, ValueKind},
};

use super::{MappingSuggestion, ProviderKind, SuggestionProvider, Suggestions};

const EXACT: f64 = 1.0;
const SUBSTRING_BASE: f64 = 0.8;
const SUBSTRING_DECAY: f64 = 0.03;
const SHAPE_BONUS: f64 = 0.1;
const SHAPE_PENALTY: f64 = 0.3;
const SUBSTRING_CAP: f64 = 0.95;
const IDENTIFIER_UNIQUENESS: f64 = 0.9;

#[derive(Debug, Clone, Default)]
pub struct HeuristicProvider {
    catalog: Catalog,
}

impl HeuristicProvider {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

/// Whether the sampled values agree with the field's expected kind; `None`
/// when the field kind says nothing about values or the column is empty.
fn shape_agreement(kind: FieldKind, sample: &ColumnSample) -> Option<bool> {
    if sample.kind == ValueKind::Empty {
        return None;
    }
    let agrees = match kind {
        FieldKind::Text => return None,
        FieldKind::Email => sample.kind == ValueKind::Email,
        FieldKind::Phone => sample.kind == ValueKind::Phone,
        FieldKind::Date => sample.kind == ValueKind::Date,
        FieldKind::Amount | FieldKind::Quantity => sample.kind.is_numeric(),
        FieldKind::Identifier => {
            matches!(sample.kind, ValueKind::Identifier | ValueKind::Integer)
        }
    };
    Some(agrees)
}

fn shape_only(kind: FieldKind, sample: &ColumnSample) -> Option<f64> {
    if shape_agreement(kind, sample) != Some(true) {
        return None;
    }
    match kind {
        FieldKind::Email => Some(0.75),
        FieldKind::Phone => Some(0.65),
        FieldKind::Date => Some(0.6),
        FieldKind::Identifier if sample.uniqueness() >= IDENTIFIER_UNIQUENESS => Some(0.45),
        FieldKind::Amount => Some(0.4),
        FieldKind::Quantity => Some(0.3),
        FieldKind::Identifier | FieldKind::Text => None,
    }
}

/// Confidence that `sample` holds `spec`, or `None` when nothing matches.
pub fn score(spec: &CanonicalFieldSpec, sample: &ColumnSample) -> Option<f64> {
    let name = sample.name.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    let snake = name.to_snake_case();
    let aliases = spec
        .aliases
        .iter()
        .map(|alias| alias.trim().to_lowercase())
        .filter(|alias| !alias.is_empty())
        .collect::<Vec<_>>();

    if aliases
        .iter()
        .any(|alias| *alias == name || alias.to_snake_case() == snake)
    {
        return Some(EXACT);
    }

    if let Some(position) = aliases.iter().position(|alias| name.contains(alias.as_str())) {
        let base = SUBSTRING_BASE - SUBSTRING_DECAY * position as f64;
        let adjusted = match shape_agreement(spec.kind, sample) {
            Some(true) => (base + SHAPE_BONUS).min(SUBSTRING_CAP),
            Some(false) => base - SHAPE_PENALTY,
            None => base,
        };
        return Some(adjusted.clamp(0.0, 1.0));
    }

    shape_only(spec.kind, sample)
}

struct Candidate {
    field: usize,
    column: usize,
    confidence: f64,
}

impl SuggestionProvider for HeuristicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Heuristic
    }

    fn suggest(&self, samples: &[ColumnSample], analysis: AnalysisType) -> Suggestions {
        let specs = self.catalog.fields(analysis).collect::<Vec<_>>();
        let mut candidates = Vec::new();
        for (field, spec) in specs.iter().enumerate() {
            for (column, sample) in samples.iter().enumerate() {
                if let Some(confidence) = score(spec, sample)
                    && confidence > 0.0
                {
                    candidates.push(Candidate {
                        field,
                        column,
                        confidence,
                    });
                }
            }
        }
        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(a.field.cmp(&b.field))
                .then(a.column.cmp(&b.column))
        });

        let mut assigned: Vec<Option<(usize, f64)>> = vec![None; specs.len()];
        let mut used_columns = vec![false; samples.len()];
        for candidate in candidates {
            if assigned[candidate.field].is_some() || used_columns[candidate.column] {
                continue;
            }
            assigned[candidate.field] = Some((candidate.column, candidate.confidence));
            used_columns[candidate.column] = true;
        }

        let items = specs
            .iter()
            .zip(assigned)
            .map(|(spec, assignment)| match assignment {
                Some((column, confidence)) => {
                    debug!(
                        "Heuristic: '{}' -> '{}' ({confidence:.2})",
                        spec.field_name, samples[column].name
                    );
                    MappingSuggestion {
                        canonical_field: spec.field_name.clone(),
                        source_column: Some(samples[column].name.clone()),
                        confidence,
                        provider: ProviderKind::Heuristic,
                    }
                }
                None => MappingSuggestion::unmatched(&spec.field_name, ProviderKind::Heuristic),
            })
            .collect();
        Suggestions::new(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fields;

    fn sample(name: &str, values: &[&str]) -> ColumnSample {
        ColumnSample::from_values(name, values.iter().copied(), 5)
    }

    fn provider() -> HeuristicProvider {
        HeuristicProvider::new(Catalog::builtin())
    }

    #[test]
    fn arabic_phone_header_with_phone_samples_is_confident() {
        let samples = vec![sample(
            "رقم الهاتف",
            &["0501234567", "+966 55 987 6543", "0559876543"],
        )];
        let suggestions = provider().suggest(&samples, AnalysisType::Customer);
        let phone = suggestions.get(fields::PHONE).expect("phone suggestion");
        assert_eq!(phone.source_column.as_deref(), Some("رقم الهاتف"));
        assert!(phone.confidence > 0.7, "confidence {}", phone.confidence);
        assert_eq!(phone.provider, ProviderKind::Heuristic);
    }

    #[test]
    fn exact_alias_names_score_one() {
        let samples = vec![
            sample("Customer Name", &["Ann", "Bob"]),
            sample("E-Mail", &["ann@example.com"]),
        ];
        let suggestions = provider().suggest(&samples, AnalysisType::Customer);
        assert_eq!(suggestions.get(fields::CUSTOMER_NAME).unwrap().confidence, 1.0);
        assert_eq!(
            suggestions.get(fields::EMAIL).unwrap().source_column.as_deref(),
            Some("E-Mail")
        );
    }

    #[test]
    fn each_column_is_suggested_once() {
        let samples = vec![sample("name", &["Ann", "Bob"])];
        let suggestions = provider().suggest(&samples, AnalysisType::Customer);
        let claimed = suggestions
            .iter()
            .filter(|s| s.source_column.is_some())
            .count();
        assert_eq!(claimed, 1);
        assert_eq!(
            suggestions.get(fields::CUSTOMER_NAME).unwrap().source_column.as_deref(),
            Some("name")
        );
    }

    #[test]
    fn unmatched_fields_are_null_with_zero_confidence() {
        let samples = vec![sample("Notes", &["gift wrap", "leave at door"])];
        let suggestions = provider().suggest(&samples, AnalysisType::Product);
        assert_eq!(suggestions.len(), Catalog::builtin().fields(AnalysisType::Product).count());
        for suggestion in suggestions.iter() {
            assert_eq!(suggestion.source_column, None);
            assert_eq!(suggestion.confidence, 0.0);
        }
    }

    #[test]
    fn value_shape_alone_suggests_email() {
        let samples = vec![sample("Contact", &["a@example.com", "b@example.org"])];
        let suggestions = provider().suggest(&samples, AnalysisType::Customer);
        let email = suggestions.get(fields::EMAIL).unwrap();
        assert_eq!(email.source_column.as_deref(), Some("Contact"));
        assert_eq!(email.confidence, 0.75);
    }

    #[test]
    fn contradicting_shape_lowers_substring_score() {
        let spec = Catalog::builtin()
            .spec(AnalysisType::Order, fields::ORDER_DATE)
            .unwrap()
            .clone();
        let dated = sample("Order Date Placed", &["2024-01-05", "2024-02-01"]);
        let texty = sample("Order Date Placed", &["soon", "later"]);
        let with_dates = score(&spec, &dated).unwrap();
        let with_text = score(&spec, &texty).unwrap();
        assert!(with_dates > with_text);
        assert!(with_dates <= SUBSTRING_CAP);
    }
}
