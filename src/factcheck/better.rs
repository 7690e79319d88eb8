//! Opposite-direction and synonym strategy
//!
//! When the forward check fails, the claim may still be recorded the other
//! way around (passive voice flips subject and object) or under a synonym
//! verb. Synonym candidates are tried sequentially; the first confirming
//! check wins and no further synonyms are probed.

use crate::error::KgError;
use crate::kg::KnowledgeGraph;
use crate::models::{is_resource_id, local_name, to_ontology_id, Triple};
use crate::synonyms::SynonymSource;

use super::CheckResult;

/// Evidence triple describing a confirmed opposite-direction match
pub(super) fn opposite_evidence(triple: &Triple) -> Triple {
    Triple::new(
        triple.subject.clone(),
        format!("is {} of", local_name(&triple.relation)),
        triple.objects.clone(),
    )
}

/// Evidence triples for a confirmed synonym opposite-direction match
pub(super) fn reversed_with_relation(triple: &Triple, relation: &str) -> Vec<Triple> {
    triple
        .objects
        .iter()
        .filter(|o| is_resource_id(o))
        .map(|object| Triple::new(object.clone(), relation.to_string(), vec![triple.subject.clone()]))
        .collect()
}

pub(super) async fn check(
    kg: &KnowledgeGraph,
    synonyms: &dyn SynonymSource,
    triple: &Triple,
) -> Result<CheckResult, KgError> {
    if kg.triple_object_exists(triple, false).await? {
        return Ok(CheckResult::exists());
    }

    if kg.opposite_exists(triple, false).await? {
        return Ok(CheckResult::possible(vec![opposite_evidence(triple)]));
    }

    let relation = local_name(&triple.relation).to_string();
    for sense in synonyms.verb_synonyms(&relation).await {
        for lemma in sense {
            if lemma == relation {
                continue;
            }
            let synonym_relation = to_ontology_id(&lemma);
            let synonym_triple = Triple::new(
                triple.subject.clone(),
                synonym_relation.clone(),
                triple.objects.clone(),
            );
            if kg.triple_object_exists(&synonym_triple, false).await? {
                return Ok(CheckResult::possible(vec![synonym_triple]));
            }
            if kg.opposite_exists(&synonym_triple, false).await? {
                return Ok(CheckResult::possible(reversed_with_relation(
                    triple,
                    &synonym_relation,
                )));
            }
        }
    }

    Ok(CheckResult::none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ONTOLOGY_NS, RESOURCE_NS};

    #[test]
    fn opposite_evidence_uses_local_relation_name() {
        let triple = Triple::new(
            format!("{RESOURCE_NS}Mr_Giuliani"),
            format!("{ONTOLOGY_NS}ignore"),
            vec![format!("{RESOURCE_NS}Social_distancing")],
        );
        let evidence = opposite_evidence(&triple);
        assert_eq!(evidence.relation, "is ignore of");
        assert_eq!(evidence.subject, triple.subject);
        assert_eq!(evidence.objects, triple.objects);
    }

    #[test]
    fn reversal_skips_literal_objects() {
        let triple = Triple::new(
            format!("{RESOURCE_NS}Mr_Giuliani"),
            format!("{ONTOLOGY_NS}claim"),
            vec!["unsubstantiated claims".into(), format!("{RESOURCE_NS}Electoral_fraud")],
        );
        let reversed = reversed_with_relation(&triple, &format!("{ONTOLOGY_NS}assert"));
        assert_eq!(reversed.len(), 1);
        assert_eq!(reversed[0].subject, format!("{RESOURCE_NS}Electoral_fraud"));
        assert_eq!(reversed[0].objects, vec![triple.subject.clone()]);
    }
}
