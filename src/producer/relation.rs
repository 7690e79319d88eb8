//! Relation lemmatization, canonical conversion, and external linking
//!
//! A relation phrase is canonicalized in two deterministic steps:
//! lemmatization to base forms (stopwords stripped, negation preserved,
//! lemmas read off the parsed document) and camelCase conversion into an
//! ontology identifier. The encoding is applied even to relations absent
//! from the real ontology — unseen relations still need a stable canonical
//! form for equality comparison.
//!
//! An optional relation-linking service can contribute ontology-verified
//! identifiers per sentence. Its results are unioned with the locally
//! derived triples rather than replacing them, so the local derivation is
//! never silently discarded.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::PipelineError;
use crate::metrics;
use crate::models::{to_ontology_id, Triple};
use crate::nlp::ParsedDocument;

use super::text::{is_stopword, tokenize};

// ============================================================================
// Lemmatization and conversion
// ============================================================================

/// Deterministic relation canonicalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationCanonicaliser;

impl RelationCanonicaliser {
    /// Lemmatize every relation to its base form.
    ///
    /// Tokens are looked up in the parsed document to read their
    /// morphological base form; tokens that never occur in the document are
    /// dropped. An empty result defaults to "is" so that no relation ever
    /// becomes empty.
    pub fn lemmatise(&self, doc: &ParsedDocument, groups: Vec<Vec<Triple>>) -> Vec<Vec<Triple>> {
        groups
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|mut triple| {
                        triple.relation = lemmatise_phrase(doc, &triple.relation);
                        triple
                    })
                    .collect()
            })
            .collect()
    }

    /// Encode every relation as a canonical ontology identifier
    pub fn convert(&self, groups: Vec<Vec<Triple>>) -> Vec<Vec<Triple>> {
        groups
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|mut triple| {
                        triple.relation = to_ontology_id(&triple.relation);
                        triple
                    })
                    .collect()
            })
            .collect()
    }
}

fn lemmatise_phrase(doc: &ParsedDocument, relation: &str) -> String {
    let cleaned = relation.replace(['[', ']'], "");
    let lemmas: Vec<String> = tokenize(&cleaned)
        .into_iter()
        .filter(|token| !is_stopword(token))
        .filter_map(|token| doc.lemma_of(&token).map(|lemma| lemma.to_string()))
        .filter(|lemma| !lemma.is_empty())
        .collect();
    if lemmas.is_empty() {
        "is".to_string()
    } else {
        lemmas.join(" ")
    }
}

// ============================================================================
// External relation linking
// ============================================================================

#[derive(Debug, Deserialize)]
struct RelationLinkResponse {
    /// Parallel (ontology identifier, raw relation phrase) pairs
    #[serde(default)]
    relations: Vec<(String, String)>,
}

/// Client for the external relation-linking service
#[derive(Debug, Clone)]
pub struct RelationLinker {
    client: Client,
    url: String,
}

impl RelationLinker {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Language(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Query the service for one sentence. Failures degrade to `None`.
    pub async fn link_sentence(&self, sentence: &str) -> Option<Vec<(String, String)>> {
        let body = format!("{{\"text\": \"{}\"}}", escape_for_json(sentence));
        let result = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::error!(
                    status = response.status().as_u16(),
                    "relation linking returned non-success status"
                );
                metrics::record_linking_failure("relation_linker");
                return None;
            }
            Err(e) => {
                tracing::error!(error = %e, "relation linking request failed");
                metrics::record_linking_failure("relation_linker");
                return None;
            }
        };

        match response.json::<RelationLinkResponse>().await {
            Ok(body) => Some(body.relations),
            Err(e) => {
                tracing::error!(error = %e, "relation linking response undecodable");
                metrics::record_linking_failure("relation_linker");
                None
            }
        }
    }

    /// Derive service-linked variants for every sentence group.
    ///
    /// A pair matches a triple when the raw phrase equals the triple's
    /// relation or one contains the other; each match yields a new triple
    /// carrying the service identifier. The caller unions these with the
    /// locally converted triples.
    pub async fn link_groups(
        &self,
        sentences: &[String],
        groups: &[Vec<Triple>],
    ) -> Vec<Vec<Triple>> {
        let mut extras: Vec<Vec<Triple>> = Vec::with_capacity(groups.len());
        for (sentence, group) in sentences.iter().zip(groups.iter()) {
            if group.is_empty() {
                extras.push(Vec::new());
                continue;
            }
            let pairs = match self.link_sentence(sentence).await {
                Some(pairs) if !pairs.is_empty() => pairs,
                _ => {
                    extras.push(Vec::new());
                    continue;
                }
            };
            let mut linked = Vec::new();
            for (ontology_id, raw_phrase) in &pairs {
                for triple in group {
                    if phrase_matches(&triple.relation, raw_phrase) {
                        let candidate = Triple::new(
                            triple.subject.clone(),
                            ontology_id.clone(),
                            triple.objects.clone(),
                        );
                        if !linked.contains(&candidate) {
                            linked.push(candidate);
                        }
                    }
                }
            }
            extras.push(linked);
        }
        extras
    }
}

/// Raw-phrase matching: exact or substring containment in either direction
fn phrase_matches(relation: &str, raw_phrase: &str) -> bool {
    if relation.is_empty() || raw_phrase.is_empty() {
        return false;
    }
    relation == raw_phrase || relation.contains(raw_phrase) || raw_phrase.contains(relation)
}

/// Normalize a sentence for embedding in a JSON request body.
///
/// Curly quotes, apostrophes, and dashes coming from scraped article text
/// break the service's JSON parser, so they are reduced to ASCII-safe
/// equivalents before the quotes are escaped.
pub fn escape_for_json(text: &str) -> String {
    text.replace('\u{2018}', "'")
        .replace('\u{2019}', "'")
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"")
        .replace('\u{2013}', "-")
        .replace('\u{2014}', "-")
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ONTOLOGY_NS;
    use crate::nlp::{ParsedSentence, ParsedToken};

    fn doc() -> ParsedDocument {
        ParsedDocument {
            sentences: vec![ParsedSentence {
                text: "John Doe did not attend school.".into(),
                tokens: vec![
                    ParsedToken { text: "John".into(), lemma: "John".into() },
                    ParsedToken { text: "Doe".into(), lemma: "Doe".into() },
                    ParsedToken { text: "did".into(), lemma: "do".into() },
                    ParsedToken { text: "not".into(), lemma: "not".into() },
                    ParsedToken { text: "attend".into(), lemma: "attend".into() },
                    ParsedToken { text: "ignored".into(), lemma: "ignore".into() },
                ],
                entities: vec![],
                noun_chunks: vec![],
            }],
        }
    }

    #[test]
    fn lemmatisation_keeps_negation() {
        assert_eq!(lemmatise_phrase(&doc(), "did not attend"), "not attend");
    }

    #[test]
    fn lemmatisation_reads_base_forms() {
        assert_eq!(lemmatise_phrase(&doc(), "ignored"), "ignore");
    }

    #[test]
    fn empty_relation_defaults_to_is() {
        assert_eq!(lemmatise_phrase(&doc(), "was"), "is");
        assert_eq!(lemmatise_phrase(&doc(), ""), "is");
    }

    #[test]
    fn brackets_are_stripped_before_tokenizing() {
        assert_eq!(lemmatise_phrase(&doc(), "[ignored]"), "ignore");
    }

    #[test]
    fn conversion_produces_ontology_ids() {
        let canon = RelationCanonicaliser;
        let groups = canon.convert(vec![vec![Triple::new("s", "not attend", vec!["o".into()])]]);
        assert_eq!(groups[0][0].relation, format!("{ONTOLOGY_NS}notAttend"));
    }

    #[test]
    fn smart_punctuation_is_normalized() {
        assert_eq!(
            escape_for_json("He said \u{201C}no\u{201D} \u{2013} it\u{2019}s over"),
            "He said \\\"no\\\" - it's over"
        );
    }

    #[test]
    fn phrase_matching_accepts_containment() {
        assert!(phrase_matches("was born in", "born"));
        assert!(phrase_matches("born", "was born in"));
        assert!(!phrase_matches("cured", "born"));
    }
}
