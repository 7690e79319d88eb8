//! Core data structures and types
//!
//! This module defines the canonical triple representation used throughout
//! the pipeline, the per-sentence grouping produced by extraction, the
//! persisted article record shapes, and the knowledge base identifier
//! helpers (resource/ontology namespaces, camelCase encoding).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Namespace prefix for knowledge base entity resources
pub const RESOURCE_NS: &str = "http://dbpedia.org/resource/";

/// Namespace prefix for knowledge base relation/predicate identifiers
pub const ONTOLOGY_NS: &str = "http://dbpedia.org/ontology/";

/// Symmetric entity-equivalence relation
pub const SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";

// ============================================================================
// Triple
// ============================================================================

/// A subject-relation-objects (SPO) factual claim.
///
/// Equality and hashing treat `objects` as a set (order-independent), while
/// serialization preserves the original object order. A triple is well-formed
/// only when the subject, the relation, and every object are non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Triple {
    /// Subject of the claim; canonical form is a resource identifier
    pub subject: String,

    /// Relation/predicate; canonical form is an ontology identifier
    pub relation: String,

    /// Objects; resource identifiers or literal strings
    pub objects: Vec<String>,
}

impl Triple {
    /// Create a new triple
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        objects: Vec<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            objects,
        }
    }

    /// Whether subject, relation, and all objects are non-empty
    pub fn is_well_formed(&self) -> bool {
        !self.subject.is_empty()
            && !self.relation.is_empty()
            && !self.objects.is_empty()
            && self.objects.iter().all(|o| !o.is_empty())
    }

    fn object_set(&self) -> BTreeSet<&str> {
        self.objects.iter().map(|o| o.as_str()).collect()
    }
}

impl PartialEq for Triple {
    fn eq(&self, other: &Self) -> bool {
        self.subject == other.subject
            && self.relation == other.relation
            && self.object_set() == other.object_set()
    }
}

impl Eq for Triple {}

impl Hash for Triple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subject.hash(state);
        self.relation.hash(state);
        // Hash the sorted object set so that hashing agrees with equality.
        self.object_set().hash(state);
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => write!(
                f,
                "({}, {}, {:?})",
                self.subject, self.relation, self.objects
            ),
        }
    }
}

/// Triples extracted from one original sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceTriples {
    /// Original (pre-coreference) sentence text
    pub sentence: String,

    /// Canonicalized triples surviving the pipeline for this sentence
    pub triples: Vec<Triple>,
}

// ============================================================================
// Stored article shapes
// ============================================================================

/// A triple as persisted alongside an article, with its knowledge graph
/// membership flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTriple {
    #[serde(flatten)]
    pub triple: Triple,

    /// Whether the triple is currently present in the knowledge graph
    pub added: bool,
}

impl StoredTriple {
    pub fn new(triple: Triple, added: bool) -> Self {
        Self { triple, added }
    }
}

/// Per-sentence triple group as persisted alongside an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSentence {
    pub sentence: String,
    pub triples: Vec<StoredTriple>,
}

/// One alternate mention of a corefering entity, with its resolution state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorefMention {
    /// Mention resource identifier
    pub mention: String,

    /// Whether a `sameAs` relation with the main mention already exists
    pub resolved: bool,
}

/// A persisted coreference cluster: representative mention plus alternates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorefEntity {
    /// Representative mention resource identifier
    pub main: String,

    /// Alternate mentions resolved to the same real-world entity
    pub mentions: Vec<CorefMention>,
}

/// A scraped article as held by the article store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Source URL, unique key of the record
    pub source: String,

    /// Raw article text
    pub texts: String,

    /// Publication date
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    /// Article headlines
    #[serde(default)]
    pub headlines: Vec<String>,

    /// Extracted per-sentence triples; `None` until extraction has run
    #[serde(default)]
    pub triples: Option<Vec<StoredSentence>>,

    /// Triples whose subject+relation maps to a different object in the graph
    #[serde(default)]
    pub conflicts: Option<Vec<Triple>>,

    /// Coreference clusters extracted from the article
    #[serde(default)]
    pub coref_entities: Option<Vec<CorefEntity>>,
}

/// Lightweight article listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub source: String,

    /// Headlines joined with ". "
    pub headlines: String,

    /// Publication date as a Unix timestamp
    pub date: Option<i64>,
}

// ============================================================================
// Identifier helpers
// ============================================================================

/// Whether a string is a resource identifier (entity URI)
pub fn is_resource_id(s: &str) -> bool {
    s.starts_with(RESOURCE_NS)
}

/// Whether a string is an ontology identifier (relation URI)
pub fn is_ontology_id(s: &str) -> bool {
    s.starts_with(ONTOLOGY_NS)
}

/// Convert a surface form into a resource identifier.
///
/// Spaces become underscores and the first character is uppercased, so
/// "social distancing" becomes `.../resource/Social_distancing`.
pub fn to_resource_id(surface: &str) -> String {
    let normalized = surface.trim().replace(' ', "_");
    let mut chars = normalized.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => normalized,
    };
    format!("{RESOURCE_NS}{capitalized}")
}

/// Convert a relation phrase into an ontology identifier via camelCase
pub fn to_ontology_id(phrase: &str) -> String {
    format!("{ONTOLOGY_NS}{}", camelise(phrase).trim_start())
}

/// Local (non-namespace) name of an identifier
pub fn local_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Encode a multi-word phrase as camelCase.
///
/// Underscores are treated as spaces. A single word is lowercased whole;
/// multiple words are title-cased and joined, with the first character
/// lowercased ("was born in" -> "wasBornIn").
pub fn camelise(phrase: &str) -> String {
    let phrase = phrase.replace('_', " ");
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.len() <= 1 {
        return phrase.to_lowercase();
    }
    let joined: String = words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect();
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample() -> Triple {
        Triple::new(
            format!("{RESOURCE_NS}John_Doe"),
            format!("{ONTOLOGY_NS}ignore"),
            vec![format!("{RESOURCE_NS}Social_distancing")],
        )
    }

    #[test]
    fn json_round_trip() {
        let triple = sample();
        let json = serde_json::to_string(&triple).unwrap();
        let parsed: Triple = serde_json::from_str(&json).unwrap();
        assert_eq!(triple, parsed);
    }

    #[test]
    fn json_shape_is_stable() {
        let triple = sample();
        let json = serde_json::to_string(&triple).unwrap();
        assert_eq!(
            json,
            "{\"subject\":\"http://dbpedia.org/resource/John_Doe\",\
             \"relation\":\"http://dbpedia.org/ontology/ignore\",\
             \"objects\":[\"http://dbpedia.org/resource/Social_distancing\"]}"
        );
    }

    #[test]
    fn equality_ignores_object_order() {
        let a = Triple::new("s", "r", vec!["x".into(), "y".into()]);
        let b = Triple::new("s", "r", vec!["y".into(), "x".into()]);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn serialization_preserves_object_order() {
        let a = Triple::new("s", "r", vec!["y".into(), "x".into()]);
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("[\"y\",\"x\"]"));
    }

    #[test]
    fn well_formed_requires_all_components() {
        assert!(sample().is_well_formed());
        assert!(!Triple::new("", "r", vec!["o".into()]).is_well_formed());
        assert!(!Triple::new("s", "", vec!["o".into()]).is_well_formed());
        assert!(!Triple::new("s", "r", vec!["".into()]).is_well_formed());
        assert!(!Triple::new("s", "r", vec![]).is_well_formed());
    }

    #[test]
    fn stored_triple_flattens_added_flag() {
        let stored = StoredTriple::new(sample(), true);
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["added"], true);
        assert_eq!(json["subject"], format!("{RESOURCE_NS}John_Doe"));
    }

    #[test]
    fn resource_id_capitalizes_and_underscores() {
        assert_eq!(
            to_resource_id("social distancing"),
            format!("{RESOURCE_NS}Social_distancing")
        );
        assert_eq!(to_resource_id("Obama"), format!("{RESOURCE_NS}Obama"));
    }

    #[test]
    fn camelise_single_and_multi_word() {
        assert_eq!(camelise("Ignore"), "ignore");
        assert_eq!(camelise("was born in"), "wasBornIn");
        assert_eq!(camelise("birth_place"), "birthPlace");
    }

    #[test]
    fn ontology_id_uses_camel_case() {
        assert_eq!(
            to_ontology_id("was born in"),
            format!("{ONTOLOGY_NS}wasBornIn")
        );
    }

    #[test]
    fn local_name_strips_namespace() {
        assert_eq!(
            local_name(&format!("{ONTOLOGY_NS}birthPlace")),
            "birthPlace"
        );
        assert_eq!(local_name("plain"), "plain");
    }
}
