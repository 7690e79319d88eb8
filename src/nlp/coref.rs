//! Coreference resolution over the language service
//!
//! Wraps the service's raw cluster output into the shape the rest of the
//! pipeline consumes: a substituted document plus a mapping from each
//! cluster's representative mention to its alternate mentions, both in
//! resource identifier form. Bare pronouns are never useful as knowledge
//! graph entities, so they are excluded no matter what the backend returns.

use std::collections::{HashMap, HashSet};

use crate::error::PipelineError;
use crate::models::to_resource_id;

use super::{CorefResponse, NlpClient};

/// Coreference clusters: main mention resource id -> alternate mention ids
pub type CorefClusters = HashMap<String, HashSet<String>>;

/// Standard personal and possessive pronouns, always excluded from clusters
const PRONOUN_BLACKLIST: &[&str] = &[
    "i", "me", "my", "mine", "you", "your", "yours", "he", "him", "his", "she", "her", "hers",
    "we", "us", "our", "ours", "they", "them", "their", "theirs", "it", "its",
];

/// A document after coreference substitution, with its entity clusters
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    /// Text with each corefering mention replaced by its cluster's
    /// representative mention
    pub text: String,

    /// Entity clusters in resource identifier form
    pub clusters: CorefClusters,
}

/// Entity coreference resolver
#[derive(Debug, Clone)]
pub struct CorefResolver {
    nlp: NlpClient,
}

impl CorefResolver {
    pub fn new(nlp: NlpClient) -> Self {
        Self { nlp }
    }

    /// Resolve coreferences in a document.
    ///
    /// Returns the substituted text together with the filtered clusters; a
    /// cluster survives only if it keeps at least one non-pronoun alternate
    /// mention besides its main form.
    pub async fn resolve(&self, text: &str) -> Result<ResolvedDocument, PipelineError> {
        let response = self.nlp.coref(text).await?;
        Ok(ResolvedDocument {
            clusters: build_clusters(&response),
            text: response.resolved,
        })
    }

    /// Coreference clusters of a document, without the substituted text
    pub async fn clusters(&self, text: &str) -> Result<CorefClusters, PipelineError> {
        Ok(self.resolve(text).await?.clusters)
    }
}

/// Convert raw service clusters into resource-id clusters, excluding
/// pronouns, self-references, and clusters left without alternates
fn build_clusters(response: &CorefResponse) -> CorefClusters {
    let mut clusters = CorefClusters::new();
    for cluster in &response.clusters {
        let mentions: HashSet<String> = cluster
            .mentions
            .iter()
            .filter(|m| !PRONOUN_BLACKLIST.contains(&m.to_lowercase().as_str()))
            .filter(|m| m.as_str() != cluster.main)
            .map(|m| to_resource_id(m))
            .collect();
        if !mentions.is_empty() {
            clusters.insert(to_resource_id(&cluster.main), mentions);
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RESOURCE_NS;
    use crate::nlp::RawCluster;

    fn response(clusters: Vec<RawCluster>) -> CorefResponse {
        CorefResponse {
            resolved: String::new(),
            clusters,
        }
    }

    #[test]
    fn pronouns_are_excluded() {
        let clusters = build_clusters(&response(vec![RawCluster {
            main: "Mr Giuliani".into(),
            mentions: vec!["He".into(), "his".into(), "Mr Giuliani".into()],
        }]));
        // Only pronoun alternates remain after filtering, so the cluster
        // is dropped entirely.
        assert!(clusters.is_empty());
    }

    #[test]
    fn surviving_mentions_become_resource_ids() {
        let clusters = build_clusters(&response(vec![RawCluster {
            main: "Barack Obama".into(),
            mentions: vec!["he".into(), "the president".into()],
        }]));
        let mentions = clusters
            .get(&format!("{RESOURCE_NS}Barack_Obama"))
            .expect("cluster kept");
        assert!(mentions.contains(&format!("{RESOURCE_NS}The_president")));
        assert_eq!(mentions.len(), 1);
    }

    #[test]
    fn empty_cluster_lists_yield_no_clusters() {
        let clusters = build_clusters(&response(vec![]));
        assert!(clusters.is_empty());
    }
}
