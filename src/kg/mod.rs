//! Knowledge graph (triple store) wrapper
//!
//! Abstract CRUD and existence/ask operations over a SPARQL triple store,
//! including the symmetric `sameAs` entity-equivalence relation and
//! transitive (same-as-aware) query support.
//!
//! Failure semantics: any non-success response from the store is raised as a
//! [`KgError`]; the wrapper never retries. Callers decide whether a single
//! failed operation aborts a batch or is skipped.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::KnowledgeGraphConfig;
use crate::error::KgError;
use crate::metrics;
use crate::models::{is_resource_id, local_name, to_resource_id, Triple, SAME_AS};

/// Pragma activating same-as-aware query resolution in the store
const TRANSITIVE_PRAGMA: &str = "DEFINE input:same-as \"yes\"\n";

/// Ontology prefix declaration used by every domain-relation query
const ONTOLOGY_PREFIX: &str = "PREFIX dbo: <http://dbpedia.org/ontology/>\n";

// ============================================================================
// SPARQL result shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct AskResponse {
    boolean: bool,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    results: SelectResults,
}

#[derive(Debug, Deserialize)]
struct SelectResults {
    bindings: Vec<HashMap<String, BindingValue>>,
}

#[derive(Debug, Deserialize)]
struct BindingValue {
    value: String,
}

// ============================================================================
// Wrapper
// ============================================================================

/// A wrapper for RDF triple store (knowledge graph) operations
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    client: Client,
    endpoint: String,
    graph: String,
}

impl KnowledgeGraph {
    /// Create a wrapper for the configured SPARQL endpoint
    pub fn new(config: &KnowledgeGraphConfig, timeout: Duration) -> Result<Self, KgError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            graph: config.graph.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Protocol plumbing
    // ------------------------------------------------------------------

    async fn ask(&self, query: String, operation: &'static str) -> Result<bool, KgError> {
        metrics::record_store_operation(operation);
        tracing::debug!(operation, "running ASK query");
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KgError::Status {
                operation,
                status: status.as_u16(),
            });
        }

        let body: AskResponse = response.json().await.map_err(|e| KgError::Decode {
            operation,
            message: e.to_string(),
        })?;
        Ok(body.boolean)
    }

    async fn select(
        &self,
        query: String,
        operation: &'static str,
    ) -> Result<Vec<HashMap<String, String>>, KgError> {
        metrics::record_store_operation(operation);
        tracing::debug!(operation, "running SELECT query");
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KgError::Status {
                operation,
                status: status.as_u16(),
            });
        }

        let body: SelectResponse = response.json().await.map_err(|e| KgError::Decode {
            operation,
            message: e.to_string(),
        })?;
        Ok(body
            .results
            .bindings
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (k, v.value)).collect())
            .collect())
    }

    async fn update(&self, query: String, operation: &'static str) -> Result<(), KgError> {
        metrics::record_store_operation(operation);
        tracing::info!(operation, "running update query");
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("update", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KgError::Status {
                operation,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Existence checks
    // ------------------------------------------------------------------

    /// Whether a resource appears in the graph as a subject or an object
    pub async fn resource_exists(&self, resource: &str) -> Result<bool, KgError> {
        let query = format!(
            "ASK WHERE {{\n  {{ <{resource}> ?p ?o . }}\n  UNION\n  {{ ?s ?p <{resource}> . }}\n}}"
        );
        self.ask(query, "resource_exists").await
    }

    /// Whether a single (subject, relation, object) statement exists
    pub async fn triple_exists(
        &self,
        subject: &str,
        relation: &str,
        object: &str,
        transitive: bool,
    ) -> Result<bool, KgError> {
        let query = format!(
            "{}{}ASK {{\n  <{}> dbo:{} {} .\n}}",
            transitive_pragma(transitive),
            ONTOLOGY_PREFIX,
            subject,
            local_name(relation),
            encode_object(object),
        );
        self.ask(query, "triple_exists").await
    }

    /// Whether a triple exists with ALL of its objects
    pub async fn triple_object_exists(
        &self,
        triple: &Triple,
        transitive: bool,
    ) -> Result<bool, KgError> {
        for object in &triple.objects {
            if !self
                .triple_exists(&triple.subject, &triple.relation, object, transitive)
                .await?
            {
                return Ok(false);
            }
        }
        Ok(!triple.objects.is_empty())
    }

    /// Whether the opposite-direction triple (object, relation, subject)
    /// exists for every resource-identifier object.
    ///
    /// Literal objects cannot be subjects and are skipped; a triple with no
    /// resource objects has no opposite direction and yields `false`.
    pub async fn opposite_exists(&self, triple: &Triple, transitive: bool) -> Result<bool, KgError> {
        let candidates: Vec<&String> = triple
            .objects
            .iter()
            .filter(|o| is_resource_id(o))
            .collect();
        if candidates.is_empty() {
            return Ok(false);
        }
        for object in candidates {
            if !self
                .triple_exists(object, &triple.relation, &triple.subject, transitive)
                .await?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Triples with the given subject and relation, or `None` when the store
    /// has no such statements. Used both for direct lookup and for conflict
    /// detection (subject+relation mapping to a different object set).
    pub async fn get_triples(
        &self,
        subject: &str,
        relation: &str,
        transitive: bool,
    ) -> Result<Option<Vec<Triple>>, KgError> {
        let query = format!(
            "{}{}SELECT ?o WHERE {{\n  <{}> dbo:{} ?o .\n}}",
            transitive_pragma(transitive),
            ONTOLOGY_PREFIX,
            subject,
            local_name(relation),
        );
        let rows = self.select(query, "get_triples").await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            rows.into_iter()
                .filter_map(|row| row.get("o").cloned())
                .map(|object| Triple::new(subject, relation, vec![object]))
                .collect(),
        ))
    }

    /// All triples with the given subject, or `None` when the subject is
    /// unknown to the store
    pub async fn get_entity(
        &self,
        subject: &str,
        transitive: bool,
    ) -> Result<Option<Vec<Triple>>, KgError> {
        let subject = if is_resource_id(subject) {
            subject.to_string()
        } else {
            to_resource_id(subject)
        };
        let query = format!(
            "{}SELECT ?r ?o WHERE {{\n  <{}> ?r ?o .\n}}",
            transitive_pragma(transitive),
            subject,
        );
        let rows = self.select(query, "get_entity").await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            rows.into_iter()
                .filter_map(|row| match (row.get("r"), row.get("o")) {
                    (Some(relation), Some(object)) => Some(Triple::new(
                        subject.clone(),
                        relation.clone(),
                        vec![object.clone()],
                    )),
                    _ => None,
                })
                .collect(),
        ))
    }

    /// Relations connecting two entities, as triples, or `None` when the
    /// entities are unconnected. The object must be a resource identifier.
    pub async fn get_relation_triples(
        &self,
        subject: &str,
        object: &str,
        transitive: bool,
    ) -> Result<Option<Vec<Triple>>, KgError> {
        if !is_resource_id(object) {
            return Ok(None);
        }
        let query = format!(
            "{}SELECT ?r WHERE {{\n  <{subject}> ?r <{object}> .\n}}",
            transitive_pragma(transitive),
        );
        let rows = self.select(query, "get_relation_triples").await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            rows.into_iter()
                .filter_map(|row| row.get("r").cloned())
                .map(|relation| Triple::new(subject, relation, vec![object.to_string()]))
                .collect(),
        ))
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Insert a single (subject, relation, object) statement
    pub async fn insert_triple(
        &self,
        subject: &str,
        relation: &str,
        object: &str,
    ) -> Result<(), KgError> {
        let query = format!(
            "{}INSERT DATA {{\n  GRAPH <{}> {{\n    <{}> dbo:{} {} .\n  }}\n}}",
            ONTOLOGY_PREFIX,
            self.graph,
            subject,
            local_name(relation),
            encode_object(object),
        );
        self.update(query, "insert_triple").await
    }

    /// Insert a triple, decomposed into one statement per object
    pub async fn insert_triple_object(&self, triple: &Triple) -> Result<(), KgError> {
        for object in &triple.objects {
            self.insert_triple(&triple.subject, &triple.relation, object)
                .await?;
        }
        Ok(())
    }

    /// Delete a single (subject, relation, object) statement
    pub async fn delete_triple(
        &self,
        subject: &str,
        relation: &str,
        object: &str,
    ) -> Result<(), KgError> {
        let query = format!(
            "{}DELETE DATA {{\n  GRAPH <{}> {{\n    <{}> dbo:{} {} .\n  }}\n}}",
            ONTOLOGY_PREFIX,
            self.graph,
            subject,
            local_name(relation),
            encode_object(object),
        );
        self.update(query, "delete_triple").await
    }

    /// Delete a triple, decomposed into one statement per object
    pub async fn delete_triple_object(&self, triple: &Triple) -> Result<(), KgError> {
        for object in &triple.objects {
            self.delete_triple(&triple.subject, &triple.relation, object)
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // sameAs
    // ------------------------------------------------------------------

    /// Assert that two resources denote the same entity.
    ///
    /// The relation is symmetric, so both directions are inserted as one
    /// logical operation.
    pub async fn add_same_as(&self, a: &str, b: &str) -> Result<(), KgError> {
        let query = format!(
            "INSERT DATA {{\n  GRAPH <{g}> {{\n    <{a}> <{rel}> <{b}> .\n    <{b}> <{rel}> <{a}> .\n  }}\n}}",
            g = self.graph,
            rel = SAME_AS,
        );
        self.update(query, "add_same_as").await
    }

    /// Retract a sameAs assertion in both directions
    pub async fn remove_same_as(&self, a: &str, b: &str) -> Result<(), KgError> {
        let query = format!(
            "DELETE DATA {{\n  GRAPH <{g}> {{\n    <{a}> <{rel}> <{b}> .\n    <{b}> <{rel}> <{a}> .\n  }}\n}}",
            g = self.graph,
            rel = SAME_AS,
        );
        self.update(query, "remove_same_as").await
    }

    /// Whether a sameAs assertion exists between two resources, in either
    /// direction
    pub async fn check_same_as(&self, a: &str, b: &str) -> Result<bool, KgError> {
        let query = format!(
            "ASK WHERE {{\n  {{ <{a}> <{rel}> <{b}> . }}\n  UNION\n  {{ <{b}> <{rel}> <{a}> . }}\n}}",
            rel = SAME_AS,
        );
        self.ask(query, "check_same_as").await
    }
}

// ============================================================================
// Query encoding
// ============================================================================

/// Encode an object for embedding in a query: resource identifiers become
/// graph node references, everything else a quoted literal
fn encode_object(object: &str) -> String {
    if is_resource_id(object) {
        format!("<{object}>")
    } else {
        format!("\"{}\"", escape_literal(object))
    }
}

/// Escape a literal string for embedding in a quoted SPARQL term
fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn transitive_pragma(transitive: bool) -> &'static str {
    if transitive {
        TRANSITIVE_PRAGMA
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RESOURCE_NS;

    #[test]
    fn resource_objects_become_node_references() {
        let object = format!("{RESOURCE_NS}Hawaii");
        assert_eq!(encode_object(&object), format!("<{object}>"));
    }

    #[test]
    fn literal_objects_are_quoted_and_escaped() {
        assert_eq!(encode_object("hello"), "\"hello\"");
        assert_eq!(
            encode_object("a \"quoted\" claim"),
            "\"a \\\"quoted\\\" claim\""
        );
    }

    #[test]
    fn transitive_mode_prepends_pragma() {
        assert!(transitive_pragma(true).contains("same-as"));
        assert_eq!(transitive_pragma(false), "");
    }
}
