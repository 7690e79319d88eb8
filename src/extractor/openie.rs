//! Open extraction service backend
//!
//! Submits a sentence to an OpenIE5-style service. Each extraction record
//! maps to one triple; the service's multi-argument output (`arg2s`) is
//! coalesced into the triple's object list.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::PipelineError;
use crate::metrics;
use crate::models::Triple;

use super::TripleExtract;

#[derive(Debug, Deserialize)]
struct ExtractionRecord {
    extraction: Extraction,
}

#[derive(Debug, Deserialize)]
struct Extraction {
    arg1: Span,
    rel: Span,
    #[serde(default)]
    arg2s: Vec<Span>,
}

#[derive(Debug, Deserialize)]
struct Span {
    text: String,
}

/// Extractor backed by a dedicated open extraction service
#[derive(Debug, Clone)]
pub struct OpenIeExtractor {
    client: Client,
    base_url: String,
}

impl OpenIeExtractor {
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

    /// Map service extraction records to triples
    fn parse_response(body: &str) -> Option<Vec<Triple>> {
        let records: Vec<ExtractionRecord> = serde_json::from_str(body).ok()?;
        Some(
            records
                .into_iter()
                .map(|record| {
                    Triple::new(
                        record.extraction.arg1.text,
                        record.extraction.rel.text,
                        record
                            .extraction
                            .arg2s
                            .into_iter()
                            .map(|span| span.text)
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

#[async_trait::async_trait]
impl TripleExtract for OpenIeExtractor {
    async fn extract(&self, sentence: &str) -> Vec<Triple> {
        let url = format!("{}/getExtraction", self.base_url);
        let result = self
            .client
            .post(&url)
            .body(sentence.to_string())
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::error!(
                    status = response.status().as_u16(),
                    "open extraction service returned non-success status"
                );
                metrics::record_extraction_failure("openie5");
                return Vec::new();
            }
            Err(e) => {
                tracing::error!(error = %e, "open extraction service request failed");
                metrics::record_extraction_failure("openie5");
                return Vec::new();
            }
        };

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "open extraction service response unreadable");
                metrics::record_extraction_failure("openie5");
                return Vec::new();
            }
        };

        match Self::parse_response(&body) {
            Some(triples) => triples,
            None => {
                tracing::error!("open extraction service response undecodable");
                metrics::record_extraction_failure("openie5");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_multiple_arguments_into_objects() {
        let body = r#"[
            {
                "extraction": {
                    "arg1": {"text": "The local government"},
                    "rel": {"text": "has asked"},
                    "arg2s": [{"text": "people"}, {"text": "to buy supplies"}]
                }
            }
        ]"#;
        let triples = OpenIeExtractor::parse_response(body).unwrap();
        assert_eq!(triples.len(), 1);
        assert_eq!(
            triples[0],
            Triple::new(
                "The local government",
                "has asked",
                vec!["people".into(), "to buy supplies".into()]
            )
        );
    }

    #[test]
    fn empty_extractions_yield_empty_list() {
        assert!(OpenIeExtractor::parse_response("[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_body_yields_none() {
        assert!(OpenIeExtractor::parse_response("{not json").is_none());
    }
}
