//! Shared helpers for integration tests

#![allow(dead_code)]

use std::time::Duration;

use verity::config::KnowledgeGraphConfig;
use verity::extractor::{Extractor, ExtractorKind};
use verity::kg::KnowledgeGraph;
use verity::nlp::NlpClient;
use verity::producer::{EntityLinker, TripleProducer};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Knowledge graph wrapper pointed at a mock SPARQL endpoint
pub fn kg_against(server: &mockito::ServerGuard) -> KnowledgeGraph {
    let config = KnowledgeGraphConfig {
        endpoint: format!("{}/sparql", server.url()),
        graph: "http://dbpedia.org".to_string(),
    };
    KnowledgeGraph::new(&config, TIMEOUT).expect("kg client")
}

/// SPARQL ASK response body
pub fn ask_body(answer: bool) -> String {
    format!("{{\"head\": {{}}, \"boolean\": {answer}}}")
}

/// SPARQL SELECT response body with one `?o` binding per value
pub fn select_objects(values: &[&str]) -> String {
    let bindings: Vec<String> = values
        .iter()
        .map(|value| format!("{{\"o\": {{\"type\": \"uri\", \"value\": \"{value}\"}}}}"))
        .collect();
    format!(
        "{{\"head\": {{\"vars\": [\"o\"]}}, \"results\": {{\"bindings\": [{}]}}}}",
        bindings.join(", ")
    )
}

/// SPARQL SELECT response body with no bindings
pub fn select_empty() -> String {
    "{\"head\": {\"vars\": []}, \"results\": {\"bindings\": []}}".to_string()
}

/// Triple producer with every external service pointed at the mock server
pub fn producer_against(server: &mockito::ServerGuard, kg: KnowledgeGraph) -> TripleProducer {
    let extractor = Extractor::from_kind(
        ExtractorKind::CoreNlp,
        &format!("{}/corenlp", server.url()),
        &format!("{}/openie", server.url()),
        TIMEOUT,
    )
    .expect("extractor");
    let nlp = NlpClient::new(format!("{}/nlp", server.url()), TIMEOUT).expect("nlp client");
    let linker =
        EntityLinker::new(format!("{}/annotate", server.url()), TIMEOUT).expect("entity linker");
    TripleProducer::new(extractor, nlp, linker, None, kg)
}

/// Parsed-document body for "John Doe ignored social distancing."
pub fn parsed_doc_body() -> String {
    r#"{
        "sentences": [
            {
                "text": "John Doe ignored social distancing.",
                "tokens": [
                    {"text": "John", "lemma": "John"},
                    {"text": "Doe", "lemma": "Doe"},
                    {"text": "ignored", "lemma": "ignore"},
                    {"text": "social", "lemma": "social"},
                    {"text": "distancing", "lemma": "distancing"},
                    {"text": ".", "lemma": "."}
                ],
                "entities": ["John Doe"],
                "noun_chunks": ["John Doe", "social distancing"]
            }
        ]
    }"#
    .to_string()
}
