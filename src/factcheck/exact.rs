//! Exact-match strategy
//!
//! Truthfulness decided only by finding the literal statement in the graph.
//! When the statement is absent, the subject+relation pair is probed for a
//! different object set — that is the definition of a conflict, and the
//! store's triples are returned as the supporting evidence.

use crate::error::KgError;
use crate::kg::KnowledgeGraph;
use crate::models::Triple;

use super::CheckResult;

pub(super) async fn check(
    kg: &KnowledgeGraph,
    triple: &Triple,
    transitive: bool,
) -> Result<CheckResult, KgError> {
    if kg.triple_object_exists(triple, transitive).await? {
        return Ok(CheckResult::exists());
    }

    if let Some(conflicts) = kg
        .get_triples(&triple.subject, &triple.relation, transitive)
        .await?
    {
        return Ok(CheckResult::conflicts(conflicts));
    }

    Ok(CheckResult::none())
}
