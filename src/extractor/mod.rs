//! Open information extraction adapters
//!
//! Two interchangeable backends produce raw surface-form triples from a
//! single sentence, behind one capability trait. The backend is selected at
//! construction time by name; an unrecognised name is a configuration error,
//! never a silent default.
//!
//! The pipeline calls `extract` per sentence so that one bad sentence cannot
//! abort document-level extraction: a malformed or failed service response
//! degrades to an empty list and is logged, never raised.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::PipelineError;
use crate::models::Triple;

mod corenlp;
mod openie;

pub use corenlp::CoreNlpExtractor;
pub use openie::OpenIeExtractor;

/// Capability contract of an open extraction backend
#[async_trait]
pub trait TripleExtract: Send + Sync {
    /// Extract raw SPO triples from a single sentence.
    ///
    /// Service failures degrade to an empty list; this method never errors.
    async fn extract(&self, sentence: &str) -> Vec<Triple>;
}

/// Extractor backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Annotation-pipeline service configured for open relation extraction
    CoreNlp,
    /// Dedicated open extraction service with multi-argument output
    OpenIe,
}

impl std::str::FromStr for ExtractorKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "corenlp" => Ok(Self::CoreNlp),
            "openie5" => Ok(Self::OpenIe),
            other => Err(PipelineError::UnknownExtractor(other.to_string())),
        }
    }
}

/// Tagged extractor dispatching to the selected backend
#[derive(Debug, Clone)]
pub enum Extractor {
    CoreNlp(CoreNlpExtractor),
    OpenIe(OpenIeExtractor),
}

impl Extractor {
    /// Build the extractor named by `kind` against the given endpoints
    pub fn from_kind(
        kind: ExtractorKind,
        corenlp_url: &str,
        openie_url: &str,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        match kind {
            ExtractorKind::CoreNlp => Ok(Self::CoreNlp(CoreNlpExtractor::new(
                corenlp_url,
                timeout,
            )?)),
            ExtractorKind::OpenIe => Ok(Self::OpenIe(OpenIeExtractor::new(openie_url, timeout)?)),
        }
    }
}

#[async_trait]
impl TripleExtract for Extractor {
    async fn extract(&self, sentence: &str) -> Vec<Triple> {
        match self {
            Self::CoreNlp(inner) => inner.extract(sentence).await,
            Self::OpenIe(inner) => inner.extract(sentence).await,
        }
    }
}
