//! Triple production pipeline integration tests with mocked services

mod common;

use common::{ask_body, kg_against, parsed_doc_body, producer_against, TIMEOUT};
use mockito::Matcher;
use std::str::FromStr;

use verity::error::{Error, PipelineError};
use verity::models::{SentenceTriples, Triple, ONTOLOGY_NS, RESOURCE_NS};
use verity::producer::{EntityLinker, ExtractionScope};

const DOCUMENT: &str = "John Doe ignored social distancing.";

#[tokio::test]
async fn pipeline_canonicalizes_extracted_triples() {
    let mut server = mockito::Server::new_async().await;

    // Language service: same parse for the original and the resolved text.
    server
        .mock("POST", "/nlp/parse")
        .with_status(200)
        .with_body(parsed_doc_body())
        .expect(2)
        .create_async()
        .await;
    server
        .mock("POST", "/nlp/coref")
        .with_status(200)
        .with_body(format!(
            "{{\"resolved\": \"{DOCUMENT}\", \"clusters\": []}}"
        ))
        .create_async()
        .await;

    // Open extraction over the single resolved sentence.
    server
        .mock("POST", "/corenlp")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"sentences": [{"openie": [
                {"subject": "John Doe", "relation": "ignored", "object": "social distancing"}
            ]}]}"#,
        )
        .create_async()
        .await;

    // Entity spotting links the subject; the object stays unspotted.
    server
        .mock("GET", "/annotate")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(format!(
            "{{\"Resources\": [{{\"@surfaceForm\": \"John Doe\", \"@URI\": \"{RESOURCE_NS}John_Doe\"}}]}}"
        ))
        .create_async()
        .await;

    // The local fallback probe finds no Social_distancing resource, so the
    // object remains a literal.
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("ASK".to_string()))
        .with_status(200)
        .with_body(ask_body(false))
        .create_async()
        .await;

    let kg = kg_against(&server);
    let producer = producer_against(&server, kg);
    let groups = producer
        .produce(DOCUMENT, ExtractionScope::from_str("noun_phrases").unwrap())
        .await
        .unwrap();

    assert_eq!(
        groups,
        vec![SentenceTriples {
            sentence: DOCUMENT.to_string(),
            triples: vec![Triple::new(
                format!("{RESOURCE_NS}John_Doe"),
                format!("{ONTOLOGY_NS}ignore"),
                vec!["social distancing".to_string()],
            )],
        }]
    );
}

#[tokio::test]
async fn scope_filter_drops_out_of_scope_triples() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/nlp/parse")
        .with_status(200)
        .with_body(parsed_doc_body())
        .expect(2)
        .create_async()
        .await;
    server
        .mock("POST", "/nlp/coref")
        .with_status(200)
        .with_body(format!(
            "{{\"resolved\": \"{DOCUMENT}\", \"clusters\": []}}"
        ))
        .create_async()
        .await;

    // One in-scope extraction and one whose object matches no noun chunk.
    server
        .mock("POST", "/corenlp")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"sentences": [{"openie": [
                {"subject": "John Doe", "relation": "ignored", "object": "social distancing"},
                {"subject": "John", "relation": "walks", "object": "towards"}
            ]}]}"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/annotate")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("POST", "/sparql")
        .with_status(200)
        .with_body(ask_body(false))
        .create_async()
        .await;

    let kg = kg_against(&server);
    let producer = producer_against(&server, kg);
    let groups = producer
        .produce(DOCUMENT, ExtractionScope::NounPhrases)
        .await
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].triples.len(), 1);
    // The subject fell back to a locally constructed resource identifier.
    assert_eq!(
        groups[0].triples[0].subject,
        format!("{RESOURCE_NS}John_Doe")
    );
}

#[tokio::test]
async fn alignment_violation_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    let resolved = "John Doe ignored social distancing. John Doe left town.";

    // The original document parses into one sentence...
    server
        .mock("POST", "/nlp/parse")
        .match_body(Matcher::PartialJsonString(format!(
            "{{\"text\": \"{DOCUMENT}\"}}"
        )))
        .with_status(200)
        .with_body(parsed_doc_body())
        .create_async()
        .await;
    // ...but the resolved document parses into two.
    server
        .mock("POST", "/nlp/parse")
        .match_body(Matcher::PartialJsonString(format!(
            "{{\"text\": \"{resolved}\"}}"
        )))
        .with_status(200)
        .with_body(
            r#"{"sentences": [
                {"text": "John Doe ignored social distancing.", "tokens": [], "entities": [], "noun_chunks": []},
                {"text": "John Doe left town.", "tokens": [], "entities": [], "noun_chunks": []}
            ]}"#,
        )
        .create_async()
        .await;
    server
        .mock("POST", "/nlp/coref")
        .with_status(200)
        .with_body(format!(
            "{{\"resolved\": \"{resolved}\", \"clusters\": []}}"
        ))
        .create_async()
        .await;
    server
        .mock("POST", "/corenlp")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"sentences": []}"#)
        .expect(2)
        .create_async()
        .await;
    server
        .mock("GET", "/annotate")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let kg = kg_against(&server);
    let producer = producer_against(&server, kg);
    let error = producer
        .produce(DOCUMENT, ExtractionScope::All)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        Error::Pipeline(PipelineError::SentenceAlignment {
            groups: 2,
            sentences: 1
        })
    ));
}

#[tokio::test]
async fn extraction_failure_degrades_to_no_triples() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/nlp/parse")
        .with_status(200)
        .with_body(parsed_doc_body())
        .expect(2)
        .create_async()
        .await;
    server
        .mock("POST", "/nlp/coref")
        .with_status(200)
        .with_body(format!(
            "{{\"resolved\": \"{DOCUMENT}\", \"clusters\": []}}"
        ))
        .create_async()
        .await;
    // The extraction service is down; the pipeline must not error.
    server
        .mock("POST", "/corenlp")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;
    server
        .mock("GET", "/annotate")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let kg = kg_against(&server);
    let producer = producer_against(&server, kg);
    let groups = producer
        .produce(DOCUMENT, ExtractionScope::All)
        .await
        .unwrap();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn local_fallback_promotes_objects_only_when_known() {
    // Object resource exists: both subject and object become identifiers.
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/annotate")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("Social_distancing".to_string()))
        .with_status(200)
        .with_body(ask_body(true))
        .create_async()
        .await;

    let kg = kg_against(&server);
    let linker = EntityLinker::new(format!("{}/annotate", server.url()), TIMEOUT).unwrap();
    let groups = vec![vec![Triple::new(
        "social distancing",
        "ignore",
        vec!["social distancing".to_string()],
    )]];
    let linked = linker.link(&kg, DOCUMENT, groups).await.unwrap();
    assert_eq!(
        linked[0][0],
        Triple::new(
            format!("{RESOURCE_NS}Social_distancing"),
            "ignore",
            vec![format!("{RESOURCE_NS}Social_distancing")],
        )
    );

    // Object resource unknown: the subject is still forced into identifier
    // form, the object stays a literal.
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/annotate")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("POST", "/sparql")
        .with_status(200)
        .with_body(ask_body(false))
        .create_async()
        .await;

    let kg = kg_against(&server);
    let linker = EntityLinker::new(format!("{}/annotate", server.url()), TIMEOUT).unwrap();
    let groups = vec![vec![Triple::new(
        "social distancing",
        "ignore",
        vec!["social distancing".to_string()],
    )]];
    let linked = linker.link(&kg, DOCUMENT, groups).await.unwrap();
    assert_eq!(
        linked[0][0],
        Triple::new(
            format!("{RESOURCE_NS}Social_distancing"),
            "ignore",
            vec!["social distancing".to_string()],
        )
    );
}
