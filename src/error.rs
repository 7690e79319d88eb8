//! Unified error handling for the verity crate
//!
//! This module provides a unified error type that consolidates all
//! domain-specific errors into a single [`Error`] enum, while keeping the
//! domain errors usable on their own at module boundaries.
//!
//! The error taxonomy distinguishes three kinds of failure:
//!
//! - transient external-service failures (extractors, entity/relation
//!   linkers, synonym source) are handled inside the adapters, which degrade
//!   to empty results and log; they never surface here
//! - store failures ([`KgError`], [`StoreError`]) are raised to the caller,
//!   who decides between batch-abort and skip-and-continue
//! - pipeline invariant violations and configuration errors
//!   ([`PipelineError`]) are raised and must not be swallowed

use std::io;
use thiserror::Error;

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Pipeline invariant or validation errors
    Pipeline,
    /// Triple store (knowledge graph) errors
    KnowledgeGraph,
    /// Article store errors
    Storage,
    /// Network-level errors
    Network,
    /// Configuration errors
    Config,
    /// Other/unknown errors
    Other,
}

/// Errors raised by the triple production pipeline itself.
///
/// `SentenceAlignment` signals an internal correctness bug and is fatal;
/// the `Unknown*` variants are construction-time validation failures.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The number of per-sentence triple groups diverged from the number of
    /// document sentences
    #[error("sentence alignment broken: {groups} triple groups for {sentences} sentences")]
    SentenceAlignment { groups: usize, sentences: usize },

    /// Unrecognized extractor backend name
    #[error("unrecognised extractor type '{0}'; use 'corenlp' or 'openie5'")]
    UnknownExtractor(String),

    /// Unrecognized extraction scope name
    #[error("unrecognised extraction scope '{0}'; use 'named_entities', 'noun_phrases', or 'all'")]
    UnknownScope(String),

    /// Unrecognized fact-checking strategy name
    #[error("unrecognised fact-check strategy '{0}'; use 'exact', 'better', or 'non_exact'")]
    UnknownStrategy(String),

    /// The language analysis service failed; the pipeline cannot proceed
    /// without sentence boundaries and token lemmas
    #[error("language service request failed: {0}")]
    Language(String),
}

/// Errors raised by the knowledge graph (triple store) wrapper.
///
/// Store operations are never retried here; a non-success response is an
/// error for the caller to handle.
#[derive(Error, Debug)]
pub enum KgError {
    /// The store answered with a non-success status code
    #[error("triple store returned status {status} during {operation}")]
    Status { operation: &'static str, status: u16 },

    /// The store response body could not be decoded
    #[error("triple store response could not be decoded during {operation}: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// The store request could not be sent
    #[error("triple store request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Errors raised by the article store
#[derive(Error, Debug)]
pub enum StoreError {
    /// No article with the given source URL
    #[error("article '{0}' not found")]
    ArticleNotFound(String),

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A persisted document did not match the expected shape
    #[error("stored document could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Unified error type for the verity crate
#[derive(Error, Debug)]
pub enum Error {
    /// Pipeline invariant and validation errors
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Knowledge graph store errors
    #[error("knowledge graph error: {0}")]
    Kg(#[from] KgError),

    /// Article store errors
    #[error("article store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Pipeline(_) => ErrorCategory::Pipeline,
            Error::Kg(_) => ErrorCategory::KnowledgeGraph,
            Error::Store(_) => ErrorCategory::Storage,
            Error::Http(_) => ErrorCategory::Network,
            Error::Config(_) => ErrorCategory::Config,
            Error::Json(_) | Error::Io(_) => ErrorCategory::Other,
        }
    }

    /// Whether a caller may reasonably skip this error and continue a batch.
    ///
    /// Alignment violations and configuration errors are never skippable.
    pub fn is_skippable(&self) -> bool {
        !matches!(
            self,
            Error::Pipeline(PipelineError::SentenceAlignment { .. }) | Error::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_errors_are_not_skippable() {
        let err = Error::from(PipelineError::SentenceAlignment {
            groups: 3,
            sentences: 2,
        });
        assert!(!err.is_skippable());
        assert_eq!(err.category(), ErrorCategory::Pipeline);
    }

    #[test]
    fn kg_errors_are_skippable_by_callers() {
        let err = Error::from(KgError::Status {
            operation: "ask",
            status: 500,
        });
        assert!(err.is_skippable());
        assert_eq!(err.category(), ErrorCategory::KnowledgeGraph);
    }

    #[test]
    fn messages_name_the_invalid_value() {
        let err = PipelineError::UnknownScope("sentences".into());
        assert!(err.to_string().contains("sentences"));
    }
}
