//! Entity linking
//!
//! Two-phase linking of triple subjects and objects to knowledge base
//! resource identifiers:
//!
//! 1. context-based: the resolved document is submitted to an external
//!    entity-spotting service and returned (surface form, URI) pairs are
//!    matched against subjects and objects — exact match first, then first
//!    substring containment (ambiguity between overlapping candidates is an
//!    accepted limitation, not resolved here);
//! 2. local fallback: subjects not yet canonical are always forced into
//!    resource identifier form so every claim stays addressable, while
//!    objects are promoted only when the constructed identifier is confirmed
//!    to exist in the local knowledge graph — a date or a quantity is a
//!    genuine literal and must not become a spurious entity.
//!
//! Spotting service failures are logged and treated as "no entities found".

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{KgError, PipelineError};
use crate::kg::KnowledgeGraph;
use crate::metrics;
use crate::models::{is_resource_id, to_resource_id, Triple};

/// One spotted entity returned by the service
#[derive(Debug, Clone, Deserialize)]
pub struct SpottedResource {
    #[serde(rename = "@surfaceForm")]
    pub surface_form: String,

    #[serde(rename = "@URI")]
    pub uri: String,
}

#[derive(Debug, Deserialize)]
struct SpotlightResponse {
    /// Absent when the service found no entities
    #[serde(rename = "Resources", default)]
    resources: Option<Vec<SpottedResource>>,
}

/// Entity linker over an external spotting service plus the local graph
#[derive(Debug, Clone)]
pub struct EntityLinker {
    client: Client,
    spotlight_url: String,
}

impl EntityLinker {
    pub fn new(spotlight_url: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Language(e.to_string()))?;
        Ok(Self {
            client,
            spotlight_url: spotlight_url.into(),
        })
    }

    /// Spot entities in a document. Failures degrade to an empty list.
    pub async fn spot(&self, document: &str) -> Vec<SpottedResource> {
        let result = self
            .client
            .get(&self.spotlight_url)
            .query(&[("text", document)])
            .header("Accept", "application/json")
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::error!(
                    status = response.status().as_u16(),
                    "entity spotting returned non-success status"
                );
                metrics::record_linking_failure("spotlight");
                return Vec::new();
            }
            Err(e) => {
                tracing::error!(error = %e, "entity spotting request failed");
                metrics::record_linking_failure("spotlight");
                return Vec::new();
            }
        };

        match response.json::<SpotlightResponse>().await {
            Ok(body) => body.resources.unwrap_or_default(),
            Err(e) => {
                tracing::error!(error = %e, "entity spotting response undecodable");
                metrics::record_linking_failure("spotlight");
                Vec::new()
            }
        }
    }

    /// Link subjects and objects of all triples: context phase over the
    /// document, then the local fallback against the knowledge graph.
    pub async fn link(
        &self,
        kg: &KnowledgeGraph,
        document: &str,
        groups: Vec<Vec<Triple>>,
    ) -> Result<Vec<Vec<Triple>>, KgError> {
        let resources = self.spot(document).await;
        let groups = link_with_context(&resources, groups);
        link_local(kg, groups).await
    }
}

/// Resolve a surface form against spotted resources: exact surface form
/// match preferred, then first substring containment match
fn find_uri(term: &str, resources: &[SpottedResource]) -> Option<String> {
    if term.is_empty() {
        return None;
    }
    if let Some(exact) = resources.iter().find(|r| r.surface_form == term) {
        return Some(exact.uri.clone());
    }
    resources
        .iter()
        .find(|r| r.surface_form.contains(term))
        .map(|r| r.uri.clone())
}

/// Apply context-based linking to every subject and object
fn link_with_context(resources: &[SpottedResource], groups: Vec<Vec<Triple>>) -> Vec<Vec<Triple>> {
    if resources.is_empty() {
        return groups;
    }
    groups
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .map(|mut triple| {
                    if let Some(uri) = find_uri(&triple.subject, resources) {
                        triple.subject = uri;
                    }
                    triple.objects = triple
                        .objects
                        .into_iter()
                        .map(|object| find_uri(&object, resources).unwrap_or(object))
                        .collect();
                    triple
                })
                .collect()
        })
        .collect()
}

/// Local fallback linking: subjects always become resource identifiers;
/// objects only when the constructed identifier already exists in the graph
async fn link_local(
    kg: &KnowledgeGraph,
    mut groups: Vec<Vec<Triple>>,
) -> Result<Vec<Vec<Triple>>, KgError> {
    for group in &mut groups {
        for triple in group.iter_mut() {
            if !triple.subject.is_empty() && !is_resource_id(&triple.subject) {
                triple.subject = to_resource_id(&triple.subject);
            }
            let mut objects = Vec::with_capacity(triple.objects.len());
            for object in triple.objects.drain(..) {
                if object.is_empty() || is_resource_id(&object) {
                    objects.push(object);
                    continue;
                }
                let candidate = to_resource_id(&object);
                if kg.resource_exists(&candidate).await? {
                    objects.push(candidate);
                } else {
                    objects.push(object);
                }
            }
            triple.objects = objects;
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RESOURCE_NS;

    fn resources() -> Vec<SpottedResource> {
        vec![
            SpottedResource {
                surface_form: "John Doe".into(),
                uri: format!("{RESOURCE_NS}John_Doe"),
            },
            SpottedResource {
                surface_form: "social distancing".into(),
                uri: format!("{RESOURCE_NS}Social_distancing"),
            },
        ]
    }

    #[test]
    fn exact_surface_form_wins() {
        assert_eq!(
            find_uri("John Doe", &resources()),
            Some(format!("{RESOURCE_NS}John_Doe"))
        );
    }

    #[test]
    fn substring_containment_is_the_fallback() {
        assert_eq!(
            find_uri("distancing", &resources()),
            Some(format!("{RESOURCE_NS}Social_distancing"))
        );
        assert_eq!(find_uri("electoral fraud", &resources()), None);
    }

    #[test]
    fn context_linking_replaces_subject_and_objects() {
        let groups = vec![vec![Triple::new(
            "John Doe",
            "ignored",
            vec!["social distancing".into(), "warnings".into()],
        )]];
        let linked = link_with_context(&resources(), groups);
        assert_eq!(
            linked[0][0],
            Triple::new(
                format!("{RESOURCE_NS}John_Doe"),
                "ignored",
                vec![
                    format!("{RESOURCE_NS}Social_distancing"),
                    "warnings".into()
                ],
            )
        );
    }

    #[test]
    fn missing_resources_key_means_no_entities() {
        let body: SpotlightResponse = serde_json::from_str("{}").unwrap();
        assert!(body.resources.is_none());
    }
}
