//! Fact-checking inference engine
//!
//! Classifies canonicalized triples against the knowledge graph using three
//! escalating strategies behind one capability:
//!
//! - **exact** — literal statement matching plus conflict detection
//! - **better** — adds opposite-direction matching and sequential verb
//!   synonym probing
//! - **non_exact** — the most complete strategy: coreference-based entity
//!   substitution, same-entity relation lookup, opposite direction, and
//!   concurrent synonym probing, reporting all corroborating and conflicting
//!   evidence
//!
//! Escalation exists because exact matching under-counts true claims:
//! passive voice, pronoun drift, and near-synonym verbs all produce surface
//! variance over the same fact. The non-exact strategy trades precision for
//! recall and returns every piece of evidence so a downstream consumer can
//! apply its own confidence threshold.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::kg::KnowledgeGraph;
use crate::metrics;
use crate::models::{SentenceTriples, Triple};
use crate::nlp::CorefClusters;
use crate::producer::{ExtractionScope, TripleProducer};
use crate::synonyms::{SynonymClient, SynonymSource};

mod better;
mod exact;
mod nonexact;

// ============================================================================
// Verdicts
// ============================================================================

/// Outcome of checking one triple against the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The exact statement is present in the graph
    Exists,
    /// The subject+relation maps to a different object set
    Conflicts,
    /// A related statement (opposite direction, coreferent entity, synonym
    /// relation) supports the claim
    Possible,
    /// Nothing in the graph speaks for or against the claim
    None,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Exists => "exists",
            Verdict::Conflicts => "conflicts",
            Verdict::Possible => "possible",
            Verdict::None => "none",
        }
    }
}

/// Verdict plus the store triples supporting it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub verdict: Verdict,

    /// Conflicting or corroborating triples from the knowledge graph
    pub evidence: Vec<Triple>,
}

impl CheckResult {
    pub fn exists() -> Self {
        Self {
            verdict: Verdict::Exists,
            evidence: Vec::new(),
        }
    }

    pub fn none() -> Self {
        Self {
            verdict: Verdict::None,
            evidence: Vec::new(),
        }
    }

    pub fn conflicts(evidence: Vec<Triple>) -> Self {
        Self {
            verdict: Verdict::Conflicts,
            evidence,
        }
    }

    pub fn possible(evidence: Vec<Triple>) -> Self {
        Self {
            verdict: Verdict::Possible,
            evidence,
        }
    }
}

/// One checked triple with its result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripleCheck {
    pub triple: Triple,
    pub result: CheckResult,
}

/// Per-sentence fact check results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceCheck {
    pub sentence: String,
    pub triples: Vec<TripleCheck>,
}

/// Full-article fact check report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCheckReport {
    pub sentences: Vec<SentenceCheck>,
    pub truthfulness: f64,
}

/// Ratio of `exists` verdicts to all checked triples; `0.0` when nothing
/// was checked (never divides by zero)
pub fn truthfulness<'a>(results: impl IntoIterator<Item = &'a CheckResult>) -> f64 {
    let mut total = 0usize;
    let mut exists = 0usize;
    for result in results {
        total += 1;
        if result.verdict == Verdict::Exists {
            exists += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        exists as f64 / total as f64
    }
}

// ============================================================================
// Strategy selection
// ============================================================================

/// Fact-checking strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Exact,
    Better,
    NonExact,
}

impl FromStr for Strategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "better" => Ok(Self::Better),
            "non_exact" => Ok(Self::NonExact),
            other => Err(PipelineError::UnknownStrategy(other.to_string())),
        }
    }
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Better => "better",
            Self::NonExact => "non_exact",
        }
    }
}

// ============================================================================
// Checker
// ============================================================================

/// State-free fact checker over the knowledge graph
#[derive(Clone)]
pub struct FactChecker {
    producer: TripleProducer,
    kg: KnowledgeGraph,
    synonyms: Arc<dyn SynonymSource>,
    strategy: Strategy,
    synonym_workers: usize,
}

impl FactChecker {
    /// Build a checker from explicit components
    pub fn new(
        producer: TripleProducer,
        kg: KnowledgeGraph,
        synonyms: Arc<dyn SynonymSource>,
        strategy: Strategy,
        synonym_workers: usize,
    ) -> Self {
        Self {
            producer,
            kg,
            synonyms,
            strategy,
            synonym_workers: synonym_workers.max(1),
        }
    }

    /// Build a checker from the application configuration
    pub fn from_config(config: &Config, kg: KnowledgeGraph, strategy: Strategy) -> Result<Self> {
        let timeout = Duration::from_secs(config.services.request_timeout_secs);
        let producer = TripleProducer::from_config(config, kg.clone())?;
        let synonyms: Arc<dyn SynonymSource> =
            Arc::new(SynonymClient::new(&config.services.synonym_url, timeout)?);
        Ok(Self::new(
            producer,
            kg,
            synonyms,
            strategy,
            config.pipeline.synonym_workers,
        ))
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Check a single triple. `transitive` widens subject matching to
    /// sameAs-linked entities (always on for the non-exact strategy).
    pub async fn check_triple(&self, triple: &Triple, transitive: bool) -> Result<CheckResult> {
        self.check_triple_with_clusters(triple, transitive, &CorefClusters::new())
            .await
    }

    /// Check a single triple with coreference clusters available for entity
    /// substitution (only the non-exact strategy uses them)
    pub async fn check_triple_with_clusters(
        &self,
        triple: &Triple,
        transitive: bool,
        clusters: &CorefClusters,
    ) -> Result<CheckResult> {
        let result = match self.strategy {
            Strategy::Exact => exact::check(&self.kg, triple, transitive).await?,
            Strategy::Better => better::check(&self.kg, self.synonyms.as_ref(), triple).await?,
            Strategy::NonExact => {
                nonexact::check(
                    &self.kg,
                    self.synonyms.as_ref(),
                    self.synonym_workers,
                    triple,
                    clusters,
                )
                .await?
            }
        };
        metrics::record_verdict(self.strategy.as_str(), result.verdict.as_str());
        Ok(result)
    }

    /// Check a batch of triples
    pub async fn check_triples(
        &self,
        triples: &[Triple],
        transitive: bool,
    ) -> Result<Vec<TripleCheck>> {
        let mut checks = Vec::with_capacity(triples.len());
        for triple in triples {
            let result = self.check_triple(triple, transitive).await?;
            checks.push(TripleCheck {
                triple: triple.clone(),
                result,
            });
        }
        Ok(checks)
    }

    /// Extract triples from an article and check each one, reporting results
    /// per sentence together with the truthfulness score
    pub async fn check_text(
        &self,
        article: &str,
        scope: ExtractionScope,
    ) -> Result<FactCheckReport> {
        let groups = self.producer.produce(article, scope).await?;
        let clusters = match self.strategy {
            Strategy::NonExact => self.producer.coref_resolver().clusters(article).await?,
            _ => CorefClusters::new(),
        };

        let mut sentences = Vec::with_capacity(groups.len());
        for SentenceTriples { sentence, triples } in groups {
            let mut checks = Vec::with_capacity(triples.len());
            for triple in triples {
                let result = self
                    .check_triple_with_clusters(&triple, false, &clusters)
                    .await?;
                checks.push(TripleCheck { triple, result });
            }
            sentences.push(SentenceCheck {
                sentence,
                triples: checks,
            });
        }

        let truthfulness = truthfulness(
            sentences
                .iter()
                .flat_map(|s| s.triples.iter())
                .map(|t| &t.result),
        );

        Ok(FactCheckReport {
            sentences,
            truthfulness,
        })
    }

    /// The producer backing this checker
    pub fn producer(&self) -> &TripleProducer {
        &self.producer
    }
}
