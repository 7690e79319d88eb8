//! Fact-checking strategy integration tests against a mock SPARQL endpoint

mod common;

use common::{ask_body, kg_against, producer_against, select_empty, select_objects};
use mockito::Matcher;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use verity::factcheck::{truthfulness, FactChecker, Strategy, Verdict};
use verity::models::{Triple, ONTOLOGY_NS, RESOURCE_NS};
use verity::synonyms::StaticSynonyms;

fn checker(
    server: &mockito::ServerGuard,
    strategy: Strategy,
    synonyms: StaticSynonyms,
) -> FactChecker {
    let kg = kg_against(server);
    let producer = producer_against(server, kg.clone());
    FactChecker::new(producer, kg, Arc::new(synonyms), strategy, 10)
}

fn giuliani_triple() -> Triple {
    Triple::new(
        format!("{RESOURCE_NS}Mr_Giuliani"),
        format!("{ONTOLOGY_NS}ignore"),
        vec![format!("{RESOURCE_NS}Social_distancing")],
    )
}

#[tokio::test]
async fn exact_match_yields_exists() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("ASK".to_string()))
        .with_status(200)
        .with_body(ask_body(true))
        .create_async()
        .await;

    let checker = checker(&server, Strategy::Exact, StaticSynonyms::new());
    let result = checker.check_triple(&giuliani_triple(), false).await.unwrap();
    assert_eq!(result.verdict, Verdict::Exists);
    assert!(result.evidence.is_empty());
}

#[tokio::test]
async fn different_object_in_store_yields_conflicts_with_evidence() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("ASK".to_string()))
        .with_status(200)
        .with_body(ask_body(false))
        .create_async()
        .await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("SELECT".to_string()))
        .with_status(200)
        .with_body(select_objects(&[&format!("{RESOURCE_NS}Mask_wearing")]))
        .create_async()
        .await;

    let checker = checker(&server, Strategy::Exact, StaticSynonyms::new());
    let result = checker.check_triple(&giuliani_triple(), false).await.unwrap();
    assert_eq!(result.verdict, Verdict::Conflicts);
    assert_eq!(
        result.evidence,
        vec![Triple::new(
            format!("{RESOURCE_NS}Mr_Giuliani"),
            format!("{ONTOLOGY_NS}ignore"),
            vec![format!("{RESOURCE_NS}Mask_wearing")],
        )]
    );
}

#[tokio::test]
async fn better_finds_the_opposite_direction() {
    // Store contains the reversed statement only.
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex(
            "Mr_Giuliani%3E.*Social_distancing%3E".to_string(),
        ))
        .with_status(200)
        .with_body(ask_body(false))
        .create_async()
        .await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex(
            "Social_distancing%3E.*Mr_Giuliani%3E".to_string(),
        ))
        .with_status(200)
        .with_body(ask_body(true))
        .create_async()
        .await;

    let checker = checker(&server, Strategy::Better, StaticSynonyms::new());
    let result = checker.check_triple(&giuliani_triple(), false).await.unwrap();
    assert_eq!(result.verdict, Verdict::Possible);
    assert_eq!(
        result.evidence,
        vec![Triple::new(
            format!("{RESOURCE_NS}Mr_Giuliani"),
            "is ignore of",
            vec![format!("{RESOURCE_NS}Social_distancing")],
        )]
    );
}

#[tokio::test]
async fn non_exact_substitutes_corefering_entities() {
    let mut server = mockito::Server::new_async().await;
    // Every statement about the extracted subject is absent...
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("ASK".to_string()),
            Matcher::Regex("Rudy_Giuliani".to_string()),
        ]))
        .with_status(200)
        .with_body(ask_body(false))
        .expect_at_least(1)
        .create_async()
        .await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("SELECT".to_string()))
        .with_status(200)
        .with_body(select_empty())
        .expect_at_least(1)
        .create_async()
        .await;
    // ...but the corefering main mention carries the fact.
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("ASK".to_string()),
            Matcher::Regex("Mr_Giuliani%3E.*Social_distancing%3E".to_string()),
        ]))
        .with_status(200)
        .with_body(ask_body(true))
        .create_async()
        .await;

    let subject = format!("{RESOURCE_NS}Rudy_Giuliani");
    let alias = format!("{RESOURCE_NS}Mr_Giuliani");
    let clusters: HashMap<String, HashSet<String>> =
        [(subject.clone(), HashSet::from([alias.clone()]))].into();

    let triple = Triple::new(
        subject,
        format!("{ONTOLOGY_NS}ignore"),
        vec![format!("{RESOURCE_NS}Social_distancing")],
    );

    let checker = checker(&server, Strategy::NonExact, StaticSynonyms::new());
    let result = checker
        .check_triple_with_clusters(&triple, true, &clusters)
        .await
        .unwrap();
    assert_eq!(result.verdict, Verdict::Possible);
    assert!(result.evidence.contains(&Triple::new(
        alias,
        format!("{ONTOLOGY_NS}ignore"),
        vec![format!("{RESOURCE_NS}Social_distancing")],
    )));
}

#[tokio::test]
async fn concurrent_synonym_probing_is_deterministic() {
    let mut server = mockito::Server::new_async().await;
    // The original relation is never in the store.
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("ASK".to_string()),
            Matcher::Regex("dbo%3Aignore".to_string()),
        ]))
        .with_status(200)
        .with_body(ask_body(false))
        .expect_at_least(1)
        .create_async()
        .await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("SELECT".to_string()))
        .with_status(200)
        .with_body(select_empty())
        .expect_at_least(1)
        .create_async()
        .await;
    // Two synonym relations confirm, one does not.
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("dbo%3Adisregard".to_string()))
        .with_status(200)
        .with_body(ask_body(true))
        .expect_at_least(1)
        .create_async()
        .await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("dbo%3Aneglect".to_string()))
        .with_status(200)
        .with_body(ask_body(true))
        .expect_at_least(1)
        .create_async()
        .await;
    server
        .mock("POST", "/sparql")
        .match_body(Matcher::Regex("dbo%3Adismiss".to_string()))
        .with_status(200)
        .with_body(ask_body(false))
        .expect_at_least(1)
        .create_async()
        .await;

    let synonyms = StaticSynonyms::new()
        .with_sense("ignore", &["disregard", "neglect"])
        .with_sense("ignore", &["dismiss"]);
    let triple = Triple::new(
        format!("{RESOURCE_NS}John_Doe"),
        format!("{ONTOLOGY_NS}ignore"),
        vec![format!("{RESOURCE_NS}Social_distancing")],
    );

    let checker = checker(&server, Strategy::NonExact, synonyms);
    let first = checker.check_triple(&triple, true).await.unwrap();
    let second = checker.check_triple(&triple, true).await.unwrap();

    assert_eq!(first.verdict, Verdict::Possible);
    // Completion order of the concurrent probes never changes the outcome.
    assert_eq!(first, second);
    let relations: Vec<String> = first
        .evidence
        .iter()
        .map(|t| t.relation.clone())
        .collect();
    assert_eq!(
        relations,
        vec![
            format!("{ONTOLOGY_NS}disregard"),
            format!("{ONTOLOGY_NS}neglect"),
        ]
    );
}

#[tokio::test]
async fn empty_batch_has_zero_truthfulness() {
    let server = mockito::Server::new_async().await;
    let checker = checker(&server, Strategy::Exact, StaticSynonyms::new());
    let checks = checker.check_triples(&[], false).await.unwrap();
    assert!(checks.is_empty());
    assert_eq!(truthfulness(checks.iter().map(|c| &c.result)), 0.0);
}
