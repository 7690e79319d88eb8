//! verity - Knowledge-based fake news detection
//!
//! Extracts subject-relation-object factual claims from news article text,
//! links the entities and relations to a canonical knowledge base
//! vocabulary, and checks each claim against a persisted knowledge graph to
//! judge its truthfulness.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures (triples, article records, identifiers)
//! - [`extractor`] - Open information extraction service adapters
//! - [`nlp`] - Language analysis and coreference resolution clients
//! - [`producer`] - The triple production pipeline (scope filtering, entity
//!   linking, relation canonicalization)
//! - [`kg`] - Knowledge graph (SPARQL triple store) wrapper
//! - [`factcheck`] - Fact-checking inference strategies
//! - [`synonyms`] - Verb synonym source for relation inference
//! - [`storage`] - Article document store
//! - [`updater`] - Knowledge graph updater and batch extraction
//! - [`api`] - HTTP API layer
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use std::str::FromStr;
//! use verity::config::Config;
//! use verity::factcheck::{FactChecker, Strategy};
//! use verity::kg::KnowledgeGraph;
//! use verity::producer::ExtractionScope;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let kg = KnowledgeGraph::new(
//!     &config.knowledge_graph,
//!     std::time::Duration::from_secs(config.services.request_timeout_secs),
//! )?;
//! let checker = FactChecker::from_config(&config, kg, Strategy::NonExact)?;
//! let report = checker
//!     .check_text(
//!         "Mr Giuliani ignored social distancing.",
//!         ExtractionScope::from_str("noun_phrases")?,
//!     )
//!     .await?;
//! println!("truthfulness: {}", report.truthfulness);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod extractor;
pub mod factcheck;
pub mod kg;
pub mod metrics;
pub mod models;
pub mod nlp;
pub mod producer;
pub mod storage;
pub mod synonyms;
pub mod updater;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, KgError, PipelineError, Result, StoreError};
    pub use crate::factcheck::{CheckResult, FactChecker, Strategy, Verdict};
    pub use crate::kg::KnowledgeGraph;
    pub use crate::models::{SentenceTriples, StoredSentence, StoredTriple, Triple};
    pub use crate::producer::{ExtractionScope, TripleProducer};
    pub use crate::storage::{ArticleStore, SqliteArticleStore};
    pub use crate::updater::KnowledgeGraphUpdater;
}

// Direct re-exports for convenience
pub use models::{SentenceTriples, Triple};
