//! JSON-over-HTTP classifier client.
//!
//! Posts a [`ClassificationRequest`] and expects
//! `{"suggestions": [{"canonical_field", "source_column", "confidence"}]}`.

use std::{env, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::ClassifierConfig;

use super::external::{ClassificationRequest, ClassifiedField, Classifier};

#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    #[serde(default)]
    suggestions: Vec<ClassifiedField>,
}

pub struct HttpClassifier {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpClassifier {
    pub fn new(endpoint: &str, timeout: Duration, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Building classifier HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().to_string(),
            api_key,
        })
    }

    /// Builds a client from configuration, reading the API key from the
    /// configured environment variable when one is named.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(
                env::var(var)
                    .with_context(|| format!("Reading classifier API key from ${var}"))?,
            ),
            None => None,
        };
        Self::new(&config.endpoint, config.timeout(), api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Classifier for HttpClassifier {
    fn classify(&self, request: &ClassificationRequest) -> Result<Vec<ClassifiedField>> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .with_context(|| format!("Calling classifier at {}", self.endpoint))?
            .error_for_status()
            .with_context(|| format!("Classifier at {} rejected the request", self.endpoint))?;
        let body: ClassificationResponse = response
            .json()
            .with_context(|| format!("Decoding classifier response from {}", self.endpoint))?;
        Ok(body.suggestions)
    }
}
