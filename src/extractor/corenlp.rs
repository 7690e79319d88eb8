//! Annotation-pipeline extraction backend
//!
//! Submits a sentence to a CoreNLP-style annotation server with the open
//! extraction annotator enabled and flattens the nested per-sentence /
//! per-extraction JSON into triples. Each extraction record carries a single
//! object.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::PipelineError;
use crate::metrics;
use crate::models::Triple;

use super::TripleExtract;

/// Annotator properties sent with every request
const ANNOTATE_PROPERTIES: &str =
    r#"{"annotators":"openie","pipelineLanguage":"en","outputFormat":"json"}"#;

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    sentences: Vec<AnnotatedSentence>,
}

#[derive(Debug, Deserialize)]
struct AnnotatedSentence {
    #[serde(default)]
    openie: Vec<OpenIeRecord>,
}

#[derive(Debug, Deserialize)]
struct OpenIeRecord {
    subject: String,
    relation: String,
    object: String,
}

/// Extractor backed by an annotation-pipeline service
#[derive(Debug, Clone)]
pub struct CoreNlpExtractor {
    client: Client,
    base_url: String,
}

impl CoreNlpExtractor {
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

    /// Flatten the nested annotation output into triples
    fn parse_response(body: &str) -> Option<Vec<Triple>> {
        let response: AnnotateResponse = serde_json::from_str(body).ok()?;
        Some(
            response
                .sentences
                .into_iter()
                .flat_map(|sentence| sentence.openie)
                .map(|record| Triple::new(record.subject, record.relation, vec![record.object]))
                .collect(),
        )
    }
}

#[async_trait::async_trait]
impl TripleExtract for CoreNlpExtractor {
    async fn extract(&self, sentence: &str) -> Vec<Triple> {
        let result = self
            .client
            .post(&self.base_url)
            .query(&[("properties", ANNOTATE_PROPERTIES)])
            .body(sentence.to_string())
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::error!(
                    status = response.status().as_u16(),
                    "annotation service returned non-success status"
                );
                metrics::record_extraction_failure("corenlp");
                return Vec::new();
            }
            Err(e) => {
                tracing::error!(error = %e, "annotation service request failed");
                metrics::record_extraction_failure("corenlp");
                return Vec::new();
            }
        };

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "annotation service response unreadable");
                metrics::record_extraction_failure("corenlp");
                return Vec::new();
            }
        };

        match Self::parse_response(&body) {
            Some(triples) => triples,
            None => {
                tracing::error!("annotation service response undecodable");
                metrics::record_extraction_failure("corenlp");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_openie_records() {
        let body = r#"{
            "sentences": [
                {
                    "openie": [
                        {"subject": "Barack Obama", "relation": "was born in", "object": "Hawaii"},
                        {"subject": "Barack Obama", "relation": "was", "object": "born"}
                    ]
                }
            ]
        }"#;
        let triples = CoreNlpExtractor::parse_response(body).unwrap();
        assert_eq!(triples.len(), 2);
        assert_eq!(
            triples[0],
            Triple::new("Barack Obama", "was born in", vec!["Hawaii".into()])
        );
    }

    #[test]
    fn empty_sentences_yield_empty_list() {
        let triples = CoreNlpExtractor::parse_response(r#"{"sentences": []}"#).unwrap();
        assert!(triples.is_empty());
    }

    #[test]
    fn malformed_body_yields_none() {
        assert!(CoreNlpExtractor::parse_response("<html>busy</html>").is_none());
    }
}
