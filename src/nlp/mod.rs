//! Language analysis service client
//!
//! The pipeline does not reimplement tokenization, sentence splitting,
//! lemmatization, named entity recognition, or coreference clustering; it
//! calls a language service that exposes those capabilities over HTTP and
//! works with the returned annotations.
//!
//! Unlike the extraction and linking adapters, a failed language service call
//! is a hard pipeline error: without sentence boundaries and lemmas nothing
//! downstream can run correctly.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PipelineError;

pub mod coref;

pub use coref::{CorefClusters, CorefResolver, ResolvedDocument};

// ============================================================================
// Wire shapes
// ============================================================================

/// One token of a parsed sentence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedToken {
    /// Token text as it appears in the document
    pub text: String,

    /// Morphological base form
    pub lemma: String,
}

/// One parsed sentence with its annotations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSentence {
    /// Sentence text
    pub text: String,

    /// Tokens in sentence order
    #[serde(default)]
    pub tokens: Vec<ParsedToken>,

    /// Named entity spans
    #[serde(default)]
    pub entities: Vec<String>,

    /// Noun chunk spans
    #[serde(default)]
    pub noun_chunks: Vec<String>,
}

/// A fully parsed document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub sentences: Vec<ParsedSentence>,
}

impl ParsedDocument {
    /// Sentence texts in document order
    pub fn sentence_texts(&self) -> Vec<String> {
        self.sentences.iter().map(|s| s.text.clone()).collect()
    }

    /// All named entity spans of the document
    pub fn entities(&self) -> Vec<String> {
        self.sentences
            .iter()
            .flat_map(|s| s.entities.iter().cloned())
            .collect()
    }

    /// All noun chunk spans of the document
    pub fn noun_chunks(&self) -> Vec<String> {
        self.sentences
            .iter()
            .flat_map(|s| s.noun_chunks.iter().cloned())
            .collect()
    }

    /// Lemma of the first occurrence of `token` in the document, if any
    pub fn lemma_of(&self, token: &str) -> Option<&str> {
        self.sentences
            .iter()
            .flat_map(|s| s.tokens.iter())
            .find(|t| t.text == token)
            .map(|t| t.lemma.as_str())
    }
}

/// A coreference cluster as returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCluster {
    /// Most representative mention of the cluster
    pub main: String,

    /// All mentions of the cluster
    pub mentions: Vec<String>,
}

/// Coreference output: substituted text plus the raw clusters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorefResponse {
    /// Document text with each corefering mention replaced by its cluster's
    /// representative mention
    pub resolved: String,

    #[serde(default)]
    pub clusters: Vec<RawCluster>,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

// ============================================================================
// Client
// ============================================================================

/// Client for the language analysis service
#[derive(Debug, Clone)]
pub struct NlpClient {
    client: Client,
    base_url: String,
}

impl NlpClient {
    /// Create a new client for the given service base URL
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

    /// Parse a document into sentences, tokens, entities, and noun chunks
    pub async fn parse(&self, text: &str) -> Result<ParsedDocument, PipelineError> {
        let url = format!("{}/parse", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&TextRequest { text })
            .send()
            .await
            .map_err(|e| PipelineError::Language(format!("parse request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Language(format!(
                "parse returned status {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<ParsedDocument>()
            .await
            .map_err(|e| PipelineError::Language(format!("parse response undecodable: {e}")))
    }

    /// Run coreference resolution over a document
    pub async fn coref(&self, text: &str) -> Result<CorefResponse, PipelineError> {
        let url = format!("{}/coref", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&TextRequest { text })
            .send()
            .await
            .map_err(|e| PipelineError::Language(format!("coref request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Language(format!(
                "coref returned status {}",
                response.status().as_u16()
            )));
        }

        response
            .json::<CorefResponse>()
            .await
            .map_err(|e| PipelineError::Language(format!("coref response undecodable: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> ParsedDocument {
        serde_json::from_str(
            r#"{
                "sentences": [
                    {
                        "text": "John Doe ignored social distancing.",
                        "tokens": [
                            {"text": "John", "lemma": "John"},
                            {"text": "Doe", "lemma": "Doe"},
                            {"text": "ignored", "lemma": "ignore"},
                            {"text": "social", "lemma": "social"},
                            {"text": "distancing", "lemma": "distancing"},
                            {"text": ".", "lemma": "."}
                        ],
                        "entities": ["John Doe"],
                        "noun_chunks": ["John Doe", "social distancing"]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn lemma_lookup_finds_first_occurrence() {
        let doc = doc();
        assert_eq!(doc.lemma_of("ignored"), Some("ignore"));
        assert_eq!(doc.lemma_of("attended"), None);
    }

    #[test]
    fn spans_are_flattened_across_sentences() {
        let doc = doc();
        assert_eq!(doc.entities(), vec!["John Doe"]);
        assert_eq!(doc.noun_chunks(), vec!["John Doe", "social distancing"]);
        assert_eq!(
            doc.sentence_texts(),
            vec!["John Doe ignored social distancing."]
        );
    }
}
