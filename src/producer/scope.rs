//! Extraction scope filtering
//!
//! Restricts extracted triples to those whose subject and at least one
//! object fall within a permitted surface-form set, produced from the
//! document's named entity spans or noun chunk spans. The unrestricted
//! scope skips filtering entirely.
//!
//! Matching is case-insensitive and accepts substring containment in either
//! direction, which compensates for boundary mismatches between the
//! extractor and the span tokenizer (an extractor may return "the president"
//! where the entity span is "President Obama"). Overlapping candidate
//! matches are not disambiguated; the first match wins.

use crate::error::PipelineError;
use crate::models::Triple;

use super::text::strip_stopwords;

/// Policy restricting which triples survive filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionScope {
    /// Subjects and objects must be named entities
    NamedEntities,
    /// Subjects and objects must be noun phrases
    NounPhrases,
    /// No filtering
    All,
}

impl std::str::FromStr for ExtractionScope {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "named_entities" => Ok(Self::NamedEntities),
            "noun_phrases" => Ok(Self::NounPhrases),
            "all" => Ok(Self::All),
            other => Err(PipelineError::UnknownScope(other.to_string())),
        }
    }
}

impl ExtractionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NamedEntities => "named_entities",
            Self::NounPhrases => "noun_phrases",
            Self::All => "all",
        }
    }
}

/// Whether a surface form matches a permitted form (case-insensitive exact
/// or substring containment in either direction)
fn matches_form(term: &str, form: &str) -> bool {
    if term.is_empty() || form.is_empty() {
        return false;
    }
    let term = term.to_lowercase();
    let form = form.to_lowercase();
    term == form || form.contains(&term) || term.contains(&form)
}

fn matches_any(term: &str, permitted: &[String]) -> bool {
    permitted.iter().any(|form| matches_form(term, form))
}

/// Retain only triples whose subject matches a permitted form and at least
/// one of whose objects also matches, applied per sentence group
pub fn filter_groups(permitted: &[String], groups: Vec<Vec<Triple>>) -> Vec<Vec<Triple>> {
    groups
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .filter(|triple| {
                    matches_any(&triple.subject, permitted)
                        && triple.objects.iter().any(|o| matches_any(o, permitted))
                })
                .collect()
        })
        .collect()
}

/// Remove stopwords from every subject and object, applied per sentence
/// group. Run before scope filtering so that determiners do not defeat
/// span matching.
pub fn strip_component_stopwords(groups: Vec<Vec<Triple>>) -> Vec<Vec<Triple>> {
    groups
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .map(|mut triple| {
                    triple.subject = strip_stopwords(&triple.subject);
                    triple.objects = triple
                        .objects
                        .iter()
                        .map(|o| strip_stopwords(o))
                        .collect();
                    triple
                })
                .collect()
        })
        .collect()
}
