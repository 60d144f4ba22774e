//! Optional YAML configuration.
//!
//! ```yaml
//! data_dir: ./data
//! catalog: ./catalog.yml
//! record_cap: 50000
//! input_encoding: windows-1256
//! suggestion:
//!   sample_rows: 200
//!   sample_values: 5
//!   min_confidence: 0.5
//!   fallback: heuristic
//!   classifier:
//!     endpoint: https://classifier.internal/v1/classify
//!     timeout_ms: 3000
//!     api_key_env: CLASSIFIER_TOKEN
//! ```
//!
//! Command-line flags take precedence over values read here.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{catalog::Catalog, suggest::FallbackPolicy};

pub const DEFAULT_SAMPLE_ROWS: usize = 200;
pub const DEFAULT_SAMPLE_VALUES: usize = 5;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub data_dir: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub record_cap: Option<usize>,
    pub input_encoding: Option<String>,
    pub suggestion: SuggestionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuggestionConfig {
    pub sample_rows: usize,
    pub sample_values: usize,
    pub min_confidence: f64,
    pub fallback: FallbackPolicy,
    pub classifier: Option<ClassifierConfig>,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
            sample_values: DEFAULT_SAMPLE_VALUES,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            fallback: FallbackPolicy::Heuristic,
            classifier: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_CLASSIFIER_TIMEOUT_MS
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: EngineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let min = self.suggestion.min_confidence;
        ensure!(
            (0.0..=1.0).contains(&min),
            "suggestion.min_confidence must be within [0, 1], got {min}"
        );
        if let Some(classifier) = &self.suggestion.classifier {
            ensure!(
                !classifier.endpoint.trim().is_empty(),
                "suggestion.classifier.endpoint must not be empty"
            );
        }
        Ok(())
    }

    /// The configured catalog, or the built-in one.
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => Catalog::load(path),
            None => Ok(Catalog::builtin()),
        }
    }
}
