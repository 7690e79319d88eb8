//! Triple production pipeline
//!
//! Orchestrates the full text-to-canonical-triple transformation: document
//! parsing, coreference resolution, per-sentence open extraction, scope
//! filtering, entity linking, relation lemmatization and conversion,
//! optional external relation linking, deduplication, and emptiness
//! filtering.
//!
//! The error policy distinguishes two failure classes. External service
//! hiccups (extraction, entity spotting, relation linking) degrade
//! gracefully inside their adapters — the pipeline continues with fewer
//! results. An internal sentence-alignment violation is fatal: it signals a
//! correctness bug in tokenization alignment, and silently continuing would
//! corrupt downstream fact checking.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::extractor::{Extractor, ExtractorKind, TripleExtract};
use crate::kg::KnowledgeGraph;
use crate::models::{SentenceTriples, Triple};
use crate::nlp::{CorefResolver, NlpClient};

mod entity;
mod relation;
mod scope;
mod text;

pub use entity::{EntityLinker, SpottedResource};
pub use relation::{escape_for_json, RelationCanonicaliser, RelationLinker};
pub use scope::ExtractionScope;

/// Produces canonicalized SPO triples from documents
#[derive(Debug, Clone)]
pub struct TripleProducer {
    extractor: Extractor,
    nlp: NlpClient,
    coref: CorefResolver,
    linker: EntityLinker,
    relations: RelationCanonicaliser,
    relation_linker: Option<RelationLinker>,
    kg: KnowledgeGraph,
}

impl TripleProducer {
    /// Build a producer from explicit components
    pub fn new(
        extractor: Extractor,
        nlp: NlpClient,
        linker: EntityLinker,
        relation_linker: Option<RelationLinker>,
        kg: KnowledgeGraph,
    ) -> Self {
        let coref = CorefResolver::new(nlp.clone());
        Self {
            extractor,
            nlp,
            coref,
            linker,
            relations: RelationCanonicaliser,
            relation_linker,
            kg,
        }
    }

    /// Build a producer from the application configuration
    pub fn from_config(config: &Config, kg: KnowledgeGraph) -> Result<Self> {
        let timeout = Duration::from_secs(config.services.request_timeout_secs);
        let kind = ExtractorKind::from_str(&config.pipeline.extractor)?;
        let extractor = Extractor::from_kind(
            kind,
            &config.services.corenlp_url,
            &config.services.openie_url,
            timeout,
        )?;
        let nlp = NlpClient::new(&config.services.language_url, timeout)?;
        let linker = EntityLinker::new(&config.services.spotlight_url, timeout)?;
        let relation_linker = if config.services.relation_linker_url.is_empty() {
            None
        } else {
            Some(RelationLinker::new(
                &config.services.relation_linker_url,
                timeout,
            )?)
        };
        Ok(Self::new(extractor, nlp, linker, relation_linker, kg))
    }

    /// The coreference resolver backing this producer
    pub fn coref_resolver(&self) -> &CorefResolver {
        &self.coref
    }

    /// Produce canonicalized triples from a document, grouped per original
    /// sentence.
    ///
    /// Only groups with at least one surviving triple are returned, paired
    /// with their original (pre-coreference) sentence text.
    pub async fn produce(
        &self,
        document: &str,
        scope: ExtractionScope,
    ) -> Result<Vec<SentenceTriples>> {
        // Original sentence boundaries are captured before coreference
        // substitution; substitution can shift boundaries, and the
        // user-facing sentence text must be the original one.
        let original_doc = self.nlp.parse(document).await?;
        let original_sentences = original_doc.sentence_texts();

        let resolved = self.coref.resolve(document).await?;
        let resolved_doc = self.nlp.parse(&resolved.text).await?;
        let resolved_sentences = resolved_doc.sentence_texts();

        tracing::debug!(
            sentences = original_sentences.len(),
            scope = scope.as_str(),
            "producing triples"
        );

        // Raw extraction, one group per resolved sentence.
        let mut groups: Vec<Vec<Triple>> = Vec::with_capacity(resolved_sentences.len());
        for sentence in &resolved_sentences {
            groups.push(self.extractor.extract(sentence).await);
        }

        // Scope filtering over entity or noun chunk spans.
        if scope != ExtractionScope::All {
            groups = scope::strip_component_stopwords(groups);
            let permitted = match scope {
                ExtractionScope::NamedEntities => resolved_doc.entities(),
                ExtractionScope::NounPhrases => resolved_doc.noun_chunks(),
                ExtractionScope::All => unreachable!(),
            };
            groups = scope::filter_groups(&permitted, groups);
        }

        // Entity linking over the full resolved document.
        let mut groups = self.linker.link(&self.kg, &resolved.text, groups).await?;

        // Service-linked relation variants are matched against the raw
        // relation phrases, so they are collected before lemmatization.
        let linked_extras = match &self.relation_linker {
            Some(linker) => linker.link_groups(&resolved_sentences, &groups).await,
            None => Vec::new(),
        };

        groups = self.relations.lemmatise(&resolved_doc, groups);
        groups = self.relations.convert(groups);

        // Union: locally derived and service-linked forms coexist.
        for (index, extras) in linked_extras.into_iter().enumerate() {
            if let Some(group) = groups.get_mut(index) {
                group.extend(extras);
            }
        }

        let groups = drop_malformed(dedup_groups(groups));

        if groups.len() != original_sentences.len() {
            return Err(PipelineError::SentenceAlignment {
                groups: groups.len(),
                sentences: original_sentences.len(),
            }
            .into());
        }

        Ok(original_sentences
            .into_iter()
            .zip(groups)
            .filter(|(_, triples)| !triples.is_empty())
            .map(|(sentence, triples)| SentenceTriples { sentence, triples })
            .collect())
    }
}

/// Deduplicate triples within each sentence group with set semantics,
/// preserving first-seen order
pub fn dedup_groups(groups: Vec<Vec<Triple>>) -> Vec<Vec<Triple>> {
    groups
        .into_iter()
        .map(|group| {
            let mut seen = HashSet::new();
            group
                .into_iter()
                .filter(|triple| seen.insert(triple.clone()))
                .collect()
        })
        .collect()
}

/// Drop triples with an empty subject, relation, or any empty object
pub fn drop_malformed(groups: Vec<Vec<Triple>>) -> Vec<Vec<Triple>> {
    groups
        .into_iter()
        .map(|group| group.into_iter().filter(Triple::is_well_formed).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_is_idempotent() {
        let groups = vec![vec![
            Triple::new("s", "r", vec!["a".into(), "b".into()]),
            Triple::new("s", "r", vec!["b".into(), "a".into()]),
            Triple::new("s", "r2", vec!["a".into()]),
        ]];
        let once = dedup_groups(groups.clone());
        let twice = dedup_groups(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once[0].len(), 2);
    }

    #[test]
    fn malformed_triples_are_dropped() {
        let groups = vec![vec![
            Triple::new("", "r", vec!["o".into()]),
            Triple::new("s", "", vec!["o".into()]),
            Triple::new("s", "r", vec!["".into()]),
            Triple::new("s", "r", vec!["o".into()]),
        ]];
        let cleaned = drop_malformed(groups);
        assert_eq!(cleaned[0], vec![Triple::new("s", "r", vec!["o".into()])]);
    }
}
