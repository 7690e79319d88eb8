//! Synonym source for relation inference
//!
//! The non-exact fact checkers broaden relation matching with verb synonyms.
//! The lexical database itself (a WordNet equivalent) is an external
//! capability reached over HTTP; a static in-memory source backs tests and
//! offline runs.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::PipelineError;
use crate::metrics;

/// A source of verb synonyms grouped by sense
#[async_trait]
pub trait SynonymSource: Send + Sync {
    /// Synonym lemmas of a verb, one inner list per sense.
    ///
    /// Failures degrade to an empty result; synonym lookup is an inference
    /// widening step, never a reason to fail a fact check.
    async fn verb_synonyms(&self, lemma: &str) -> Vec<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct SynsetResponse {
    #[serde(default)]
    synsets: Vec<Vec<String>>,
}

/// HTTP-backed synonym source
#[derive(Debug, Clone)]
pub struct SynonymClient {
    client: Client,
    base_url: String,
}

impl SynonymClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Language(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SynonymSource for SynonymClient {
    async fn verb_synonyms(&self, lemma: &str) -> Vec<Vec<String>> {
        let url = format!("{}/synsets", self.base_url);
        let result = self
            .client
            .get(&url)
            .query(&[("lemma", lemma), ("pos", "verb")])
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::error!(
                    status = response.status().as_u16(),
                    "synonym service returned non-success status"
                );
                metrics::record_linking_failure("synonyms");
                return Vec::new();
            }
            Err(e) => {
                tracing::error!(error = %e, "synonym service request failed");
                metrics::record_linking_failure("synonyms");
                return Vec::new();
            }
        };

        match response.json::<SynsetResponse>().await {
            Ok(body) => body.synsets,
            Err(e) => {
                tracing::error!(error = %e, "synonym service response undecodable");
                metrics::record_linking_failure("synonyms");
                Vec::new()
            }
        }
    }
}

/// Fixed in-memory synonym source for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticSynonyms {
    synsets: HashMap<String, Vec<Vec<String>>>,
}

impl StaticSynonyms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one sense's lemmas for a verb
    pub fn with_sense(mut self, lemma: &str, sense: &[&str]) -> Self {
        self.synsets
            .entry(lemma.to_string())
            .or_default()
            .push(sense.iter().map(|s| s.to_string()).collect());
        self
    }
}

#[async_trait]
impl SynonymSource for StaticSynonyms {
    async fn verb_synonyms(&self, lemma: &str) -> Vec<Vec<String>> {
        self.synsets.get(lemma).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_source_returns_registered_senses() {
        let source = StaticSynonyms::new()
            .with_sense("ignore", &["disregard", "neglect"])
            .with_sense("ignore", &["dismiss"]);
        let senses = tokio_test::block_on(source.verb_synonyms("ignore"));
        assert_eq!(senses.len(), 2);
        assert_eq!(senses[0], vec!["disregard", "neglect"]);
    }

    #[test]
    fn unknown_lemma_yields_no_senses() {
        let source = StaticSynonyms::new();
        assert!(tokio_test::block_on(source.verb_synonyms("cure")).is_empty());
    }
}
