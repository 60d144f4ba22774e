//! Suggestion provider backed by an external classification service.
//!
//! The classifier runs on a worker thread under a deadline. Its answer is
//! validated against the sampled columns: unknown columns become `None` with
//! confidence `0.0`, fields outside the catalog are dropped and confidences
//! are clamped to `[0, 1]`. A failed or late call degrades according to the
//! provider's [`FallbackPolicy`] and is never reported as an error.

use std::{
    str::FromStr,
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use anyhow::{Result, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::AnalysisType,
    profile::ColumnSample,
};

use super::{
    HeuristicProvider, MappingSuggestion, ProviderKind, SuggestionProvider, Suggestions,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRequest {
    pub analysis_type: AnalysisType,
    pub fields: Vec<FieldDescriptor>,
    pub columns: Vec<ColumnSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedField {
    pub canonical_field: String,
    #[serde(default)]
    pub source_column: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

pub trait Classifier: Send + Sync {
    fn classify(&self, request: &ClassificationRequest) -> Result<Vec<ClassifiedField>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    #[default]
    Heuristic,
    Empty,
}

impl FromStr for FallbackPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "heuristic" => Ok(FallbackPolicy::Heuristic),
            "empty" | "none" => Ok(FallbackPolicy::Empty),
            other => Err(anyhow!(
                "Unknown fallback policy '{other}'. Supported values: heuristic, empty"
            )),
        }
    }
}

pub struct ExternalClassifierProvider {
    classifier: Arc<dyn Classifier>,
    heuristic: HeuristicProvider,
    fallback: FallbackPolicy,
    timeout: Duration,
}

impl ExternalClassifierProvider {
    pub fn new(classifier: Arc<dyn Classifier>, heuristic: HeuristicProvider) -> Self {
        Self {
            classifier,
            heuristic,
            fallback: FallbackPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, samples: &[ColumnSample], analysis: AnalysisType) -> ClassificationRequest {
        ClassificationRequest {
            analysis_type: analysis,
            fields: self
                .heuristic
                .catalog()
                .fields(analysis)
                .map(|spec| FieldDescriptor {
                    name: spec.field_name.clone(),
                    aliases: spec.aliases.clone(),
                })
                .collect(),
            columns: samples.to_vec(),
        }
    }

    fn call_with_deadline(&self, request: ClassificationRequest) -> Result<Vec<ClassifiedField>> {
        let (sender, receiver) = mpsc::channel();
        let classifier = Arc::clone(&self.classifier);
        thread::Builder::new()
            .name("classifier".to_string())
            .spawn(move || {
                let _ = sender.send(classifier.classify(&request));
            })
            .map_err(|err| anyhow!("Spawning classifier worker: {err}"))?;
        match receiver.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(anyhow!(
                "Classifier did not answer within {} ms",
                self.timeout.as_millis()
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(anyhow!("Classifier worker exited without an answer"))
            }
        }
    }

    fn validate(
        &self,
        classified: Vec<ClassifiedField>,
        samples: &[ColumnSample],
        analysis: AnalysisType,
    ) -> Suggestions {
        let items = self
            .heuristic
            .catalog()
            .fields(analysis)
            .map(|spec| {
                let Some(entry) = classified
                    .iter()
                    .find(|entry| entry.canonical_field == spec.field_name)
                else {
                    return MappingSuggestion::unmatched(&spec.field_name, ProviderKind::External);
                };
                let column = entry
                    .source_column
                    .as_deref()
                    .map(str::trim)
                    .filter(|column| !column.is_empty());
                match column {
                    Some(column) if samples.iter().any(|s| s.name == column) => {
                        let confidence = if entry.confidence.is_finite() {
                            entry.confidence.clamp(0.0, 1.0)
                        } else {
                            0.0
                        };
                        MappingSuggestion {
                            canonical_field: spec.field_name.clone(),
                            source_column: Some(column.to_string()),
                            confidence,
                            provider: ProviderKind::External,
                        }
                    }
                    Some(column) => {
                        warn!(
                            "Classifier suggested unknown column '{column}' for '{}'; discarding",
                            spec.field_name
                        );
                        MappingSuggestion::unmatched(&spec.field_name, ProviderKind::External)
                    }
                    None => MappingSuggestion::unmatched(&spec.field_name, ProviderKind::External),
                }
            })
            .collect::<Vec<_>>();
        for entry in &classified {
            if !items.iter().any(|s| s.canonical_field == entry.canonical_field) {
                warn!(
                    "Classifier returned field '{}' outside the {analysis} catalog; discarding",
                    entry.canonical_field
                );
            }
        }
        Suggestions::new(items)
    }
}

impl SuggestionProvider for ExternalClassifierProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::External
    }

    fn suggest(&self, samples: &[ColumnSample], analysis: AnalysisType) -> Suggestions {
        let request = self.request(samples, analysis);
        match self.call_with_deadline(request) {
            Ok(classified) => {
                debug!("Classifier answered with {} entries", classified.len());
                self.validate(classified, samples, analysis)
            }
            Err(err) => {
                warn!("External classifier failed: {err:#}");
                match self.fallback {
                    FallbackPolicy::Heuristic => self.heuristic.suggest(samples, analysis),
                    FallbackPolicy::Empty => Suggestions::default(),
                }
            }
        }
    }
}
