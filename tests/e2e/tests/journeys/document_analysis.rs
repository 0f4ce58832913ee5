//! Full-document analysis journeys: the map-reduce pass that bypasses
//! retrieval when a pinned document is analyzed as a whole.

use std::sync::Arc;

use docent_core::{Orchestrator, RoutingConfig};
use docent_e2e_tests::fixtures::{embedder, seed_corpus};
use docent_e2e_tests::mocks::ScriptedModel;

#[tokio::test]
async fn analyze_request_on_pinned_document_runs_map_reduce() {
    let embedder = embedder();
    let corpus = seed_corpus(&embedder).await;
    let model = Arc::new(ScriptedModel::new());

    let orchestrator = Orchestrator::new(
        corpus.store.clone(),
        embedder,
        model.clone(),
        RoutingConfig::default(),
    )
    .unwrap();

    let answer = orchestrator
        .answer(
            "Please analyze this document for anything about approvals",
            Some(corpus.policy_doc),
        )
        .await;

    assert!(answer.contains("synthesized answer"));
    let calls = model.recorded();
    // Three segments fit one extraction chunk; then one reduction.
    assert_eq!(calls.len(), 2);
    assert!(calls[0].is_extraction());
    assert!(calls[0].user.contains("{Remote Work Policy}"));
    assert!(calls[1].is_synthesis());
    assert!(calls[1].user.contains("extracted relevant material"));
}

#[tokio::test]
async fn analyze_request_without_pinned_document_routes_normally() {
    let embedder = embedder();
    let corpus = seed_corpus(&embedder).await;
    let model = Arc::new(ScriptedModel::new());

    let orchestrator = Orchestrator::new(
        corpus.store.clone(),
        embedder,
        model.clone(),
        RoutingConfig::default(),
    )
    .unwrap();

    let _ = orchestrator
        .answer("Please analyze this document for anything about approvals", None)
        .await;

    // No pinned document: no extraction calls, the query went through
    // the probe-and-route pipeline.
    let calls = model.recorded();
    assert!(calls.iter().all(|c| !c.is_extraction()));
}

#[tokio::test]
async fn targeted_question_on_pinned_document_skips_map_reduce() {
    let embedder = embedder();
    let corpus = seed_corpus(&embedder).await;
    let model = Arc::new(ScriptedModel::new());

    let orchestrator = Orchestrator::new(
        corpus.store.clone(),
        embedder,
        model.clone(),
        RoutingConfig::default(),
    )
    .unwrap();

    let _ = orchestrator
        .answer("How many remote work days are allowed?", Some(corpus.policy_doc))
        .await;

    let calls = model.recorded();
    assert!(calls.iter().all(|c| !c.is_extraction()));
}
