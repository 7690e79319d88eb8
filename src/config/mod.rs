//! Configuration management for verity
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Every external collaborator (extraction
//! services, language service, entity/relation linkers, synonym source,
//! triple store, article store) is addressed here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External NLP service endpoints
    pub services: ServiceConfig,

    /// Triple store (knowledge graph) configuration
    pub knowledge_graph: KnowledgeGraphConfig,

    /// Article store configuration
    pub storage: StorageConfig,

    /// Pipeline behavior configuration
    pub pipeline: PipelineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Endpoints of the external services the pipeline calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Annotation-pipeline open extraction endpoint (CoreNLP-style)
    pub corenlp_url: String,

    /// Open extraction service endpoint (OpenIE5-style)
    pub openie_url: String,

    /// Language analysis service endpoint (parsing + coreference)
    pub language_url: String,

    /// Entity-spotting service endpoint
    pub spotlight_url: String,

    /// Relation-linking service endpoint; empty disables relation linking
    #[serde(default)]
    pub relation_linker_url: String,

    /// Synonym (WordNet-equivalent) service endpoint
    pub synonym_url: String,

    /// Request timeout in seconds for all service calls
    pub request_timeout_secs: u64,
}

/// Triple store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGraphConfig {
    /// SPARQL endpoint URL
    pub endpoint: String,

    /// Named graph that receives inserts and deletes
    pub graph: String,
}

/// Article store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Extractor backend ("corenlp" or "openie5")
    pub extractor: String,

    /// Extraction scope ("named_entities", "noun_phrases", or "all")
    pub extraction_scope: String,

    /// Whether extracted non-conflicting triples are inserted into the
    /// knowledge graph without user confirmation
    pub auto_update: bool,

    /// Bounded worker count for concurrent synonym probing
    pub synonym_workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let corenlp_url = std::env::var("VERITY_CORENLP_URL")
            .unwrap_or_else(|_| String::from("http://localhost:9000"));

        let openie_url = std::env::var("VERITY_OPENIE_URL")
            .unwrap_or_else(|_| String::from("http://localhost:8000"));

        let language_url = std::env::var("VERITY_LANGUAGE_URL")
            .unwrap_or_else(|_| String::from("http://localhost:8064"));

        let spotlight_url = std::env::var("VERITY_SPOTLIGHT_URL")
            .unwrap_or_else(|_| String::from("https://api.dbpedia-spotlight.org/en/annotate"));

        let relation_linker_url = std::env::var("VERITY_RELATION_LINKER_URL")
            .unwrap_or_else(|_| String::from("https://labs.tib.eu/falcon/api?mode=long"));

        let synonym_url = std::env::var("VERITY_SYNONYM_URL")
            .unwrap_or_else(|_| String::from("http://localhost:8065"));

        let request_timeout_secs = std::env::var("VERITY_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let endpoint = std::env::var("VERITY_SPARQL_ENDPOINT")
            .unwrap_or_else(|_| String::from("http://localhost:8890/sparql"));

        let graph = std::env::var("VERITY_GRAPH_URI")
            .unwrap_or_else(|_| String::from("http://dbpedia.org"));

        let sqlite_path = std::env::var("VERITY_SQLITE_PATH")
            .unwrap_or_else(|_| String::from("data/articles.db"))
            .into();

        let extractor =
            std::env::var("VERITY_EXTRACTOR").unwrap_or_else(|_| String::from("corenlp"));

        let extraction_scope =
            std::env::var("VERITY_EXTRACTION_SCOPE").unwrap_or_else(|_| String::from("noun_phrases"));

        let auto_update = std::env::var("VERITY_AUTO_UPDATE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let synonym_workers = std::env::var("VERITY_SYNONYM_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10);

        let level = std::env::var("VERITY_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let format = std::env::var("VERITY_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            services: ServiceConfig {
                corenlp_url,
                openie_url,
                language_url,
                spotlight_url,
                relation_linker_url,
                synonym_url,
                request_timeout_secs,
            },
            knowledge_graph: KnowledgeGraphConfig { endpoint, graph },
            storage: StorageConfig { sqlite_path },
            pipeline: PipelineConfig {
                extractor,
                extraction_scope,
                auto_update,
                synonym_workers,
            },
            logging: LoggingConfig { level, format },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("corenlp_url", &self.services.corenlp_url),
            ("openie_url", &self.services.openie_url),
            ("language_url", &self.services.language_url),
            ("spotlight_url", &self.services.spotlight_url),
            ("synonym_url", &self.services.synonym_url),
            ("sparql endpoint", &self.knowledge_graph.endpoint),
        ] {
            Url::parse(value).with_context(|| format!("{name} is not a valid URL: {value}"))?;
        }

        if !self.services.relation_linker_url.is_empty() {
            Url::parse(&self.services.relation_linker_url).with_context(|| {
                format!(
                    "relation_linker_url is not a valid URL: {}",
                    self.services.relation_linker_url
                )
            })?;
        }

        if self.services.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.pipeline.synonym_workers == 0 {
            anyhow::bail!("synonym_workers must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_env_config_is_valid() {
        let config = Config::from_env().unwrap();
        config.validate().unwrap();
        assert_eq!(config.pipeline.extractor, "corenlp");
        assert_eq!(config.pipeline.extraction_scope, "noun_phrases");
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::from_env().unwrap();
        config.pipeline.synonym_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let mut config = Config::from_env().unwrap();
        config.knowledge_graph.endpoint = String::from("not a url");
        assert!(config.validate().is_err());
    }
}
