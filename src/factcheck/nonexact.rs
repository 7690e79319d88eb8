//! Non-exact strategy
//!
//! The most complete inference: after the transitive forward check fails,
//! every combination of subject/object substitution from the coreference
//! clusters (original included) is tried against the graph. Each candidate
//! contributes evidence through four independent signals: a forward match,
//! relations already connecting the same entities, subject+relation
//! conflicts, the opposite direction, and synonym relations.
//!
//! Synonym candidates each require an independent store round-trip, so they
//! are probed concurrently on a bounded pool. All confirming results are
//! kept (first-come-first-included, not first-only); the final evidence is
//! a set union, so completion order never changes the outcome.

use futures::stream::{self, StreamExt};

use crate::error::KgError;
use crate::kg::KnowledgeGraph;
use crate::models::{local_name, to_ontology_id, Triple};
use crate::nlp::CorefClusters;
use crate::synonyms::SynonymSource;

use super::better::{opposite_evidence, reversed_with_relation};
use super::CheckResult;

fn push_unique(collected: &mut Vec<Triple>, triple: Triple) {
    if !collected.contains(&triple) {
        collected.push(triple);
    }
}

/// All substitution candidates for a triple given the coreference clusters:
/// the original, subject-substituted, object-substituted, and
/// both-substituted variants. Cluster members are iterated in sorted order
/// so candidate order is deterministic.
pub(super) fn coreference_substitutions(
    triple: &Triple,
    clusters: &CorefClusters,
) -> Vec<Triple> {
    let mut candidates = vec![triple.clone()];

    let subject_corefs: Vec<String> = clusters
        .get(&triple.subject)
        .map(|set| {
            let mut sorted: Vec<String> = set.iter().cloned().collect();
            sorted.sort();
            sorted
        })
        .unwrap_or_default();

    let object_corefs: Vec<String> = {
        let mut collected: Vec<String> = triple
            .objects
            .iter()
            .filter_map(|o| clusters.get(o))
            .flat_map(|set| set.iter().cloned())
            .collect();
        collected.sort();
        collected.dedup();
        collected
    };

    for coref in &subject_corefs {
        candidates.push(Triple::new(
            coref.clone(),
            triple.relation.clone(),
            triple.objects.clone(),
        ));
    }
    for coref in &object_corefs {
        candidates.push(Triple::new(
            triple.subject.clone(),
            triple.relation.clone(),
            vec![coref.clone()],
        ));
    }
    for subject_coref in &subject_corefs {
        for object_coref in &object_corefs {
            candidates.push(Triple::new(
                subject_coref.clone(),
                triple.relation.clone(),
                vec![object_coref.clone()],
            ));
        }
    }

    candidates
}

/// Probe one synonym lemma: forward first, then the opposite direction.
async fn probe_synonym(
    kg: &KnowledgeGraph,
    triple: &Triple,
    lemma: &str,
) -> Result<Option<Vec<Triple>>, KgError> {
    let relation = to_ontology_id(lemma);
    let synonym_triple = Triple::new(
        triple.subject.clone(),
        relation.clone(),
        triple.objects.clone(),
    );
    if kg.triple_object_exists(&synonym_triple, true).await? {
        return Ok(Some(vec![synonym_triple]));
    }
    if kg.opposite_exists(&synonym_triple, true).await? {
        return Ok(Some(reversed_with_relation(triple, &relation)));
    }
    Ok(None)
}

/// Check all synonym relations of a triple concurrently, keeping every
/// confirmation. Results are sorted so the outcome is independent of
/// completion order.
pub(super) async fn check_relation_synonyms(
    kg: &KnowledgeGraph,
    synonyms: &dyn SynonymSource,
    workers: usize,
    triple: &Triple,
) -> Result<Vec<Triple>, KgError> {
    let relation = local_name(&triple.relation).to_string();

    let mut lemmas: Vec<String> = synonyms
        .verb_synonyms(&relation)
        .await
        .into_iter()
        .flatten()
        .filter(|lemma| *lemma != relation)
        .collect();
    lemmas.sort();
    lemmas.dedup();

    let probes = stream::iter(lemmas.into_iter().map(|lemma| {
        let kg = kg.clone();
        let triple = triple.clone();
        async move { probe_synonym(&kg, &triple, &lemma).await }
    }))
    .buffer_unordered(workers)
    .collect::<Vec<_>>()
    .await;

    let mut confirmations = Vec::new();
    for probe in probes {
        if let Some(triples) = probe? {
            for found in triples {
                push_unique(&mut confirmations, found);
            }
        }
    }
    confirmations.sort_by(|a, b| (&a.relation, &a.subject).cmp(&(&b.relation, &b.subject)));
    Ok(confirmations)
}

pub(super) async fn check(
    kg: &KnowledgeGraph,
    synonyms: &dyn SynonymSource,
    workers: usize,
    original: &Triple,
    clusters: &CorefClusters,
) -> Result<CheckResult, KgError> {
    if kg.triple_object_exists(original, true).await? {
        return Ok(CheckResult::exists());
    }

    let candidates = if clusters.is_empty() {
        vec![original.clone()]
    } else {
        coreference_substitutions(original, clusters)
    };

    let mut possibilities: Vec<Triple> = Vec::new();
    let mut conflicts: Vec<Triple> = Vec::new();

    for candidate in &candidates {
        if kg.triple_object_exists(candidate, true).await? {
            push_unique(&mut possibilities, candidate.clone());
            break;
        }

        // Relations already connecting the same pair of entities.
        for object in &candidate.objects {
            if let Some(related) = kg
                .get_relation_triples(&candidate.subject, object, true)
                .await?
            {
                for triple in related {
                    push_unique(&mut possibilities, triple);
                }
            }
        }

        if let Some(found) = kg
            .get_triples(&candidate.subject, &candidate.relation, true)
            .await?
        {
            for triple in found {
                push_unique(&mut conflicts, triple);
            }
        }

        if kg.opposite_exists(candidate, true).await? {
            push_unique(&mut possibilities, opposite_evidence(candidate));
        }

        for triple in check_relation_synonyms(kg, synonyms, workers, candidate).await? {
            push_unique(&mut possibilities, triple);
        }
    }

    if !possibilities.is_empty() {
        // Conflicts found along the way are reported together with the
        // possibilities, deduplicated as a set union.
        for conflict in conflicts {
            push_unique(&mut possibilities, conflict);
        }
        return Ok(CheckResult::possible(possibilities));
    }
    if !conflicts.is_empty() {
        return Ok(CheckResult::conflicts(conflicts));
    }

    Ok(CheckResult::none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ONTOLOGY_NS, RESOURCE_NS};
    use std::collections::HashSet;

    fn cluster(main: &str, mentions: &[&str]) -> (String, HashSet<String>) {
        (
            main.to_string(),
            mentions.iter().map(|m| m.to_string()).collect(),
        )
    }

    #[test]
    fn substitutions_cover_all_combinations() {
        let subject = format!("{RESOURCE_NS}Mr_Giuliani");
        let object = format!("{RESOURCE_NS}Social_distancing");
        let alias = format!("{RESOURCE_NS}Rudy_Giuliani");
        let other = format!("{RESOURCE_NS}Distancing");

        let clusters: CorefClusters = [
            cluster(&subject, &[&alias]),
            cluster(&object, &[&other]),
        ]
        .into_iter()
        .collect();

        let triple = Triple::new(
            subject.clone(),
            format!("{ONTOLOGY_NS}ignore"),
            vec![object.clone()],
        );
        let candidates = coreference_substitutions(&triple, &clusters);

        // original + subject swap + object swap + both swapped
        assert_eq!(candidates.len(), 4);
        assert!(candidates.contains(&triple));
        assert!(candidates.contains(&Triple::new(
            alias.clone(),
            triple.relation.clone(),
            vec![object.clone()]
        )));
        assert!(candidates.contains(&Triple::new(
            subject.clone(),
            triple.relation.clone(),
            vec![other.clone()]
        )));
        assert!(candidates.contains(&Triple::new(
            alias,
            triple.relation.clone(),
            vec![other]
        )));
    }

    #[test]
    fn no_clusters_yields_only_the_original() {
        let triple = Triple::new("s", "r", vec!["o".into()]);
        let candidates = coreference_substitutions(&triple, &CorefClusters::new());
        assert_eq!(candidates, vec![triple]);
    }
}
