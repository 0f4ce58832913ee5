//! Streaming orchestration journeys: event ordering, summaries, and
//! consumer cancellation.

use std::sync::Arc;

use docent_core::orchestrator::ProgressEventKind;
use docent_core::{Orchestrator, RoutingConfig};
use docent_e2e_tests::fixtures::{embedder, seed_corpus};
use docent_e2e_tests::mocks::ScriptedModel;

async fn collect_events(
    mut rx: tokio::sync::mpsc::Receiver<docent_core::ProgressEvent>,
) -> Vec<ProgressEventKind> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event.kind);
    }
    events
}

#[tokio::test]
async fn short_path_stream_ends_with_response() {
    let embedder = embedder();
    let corpus = seed_corpus(&embedder).await;
    let model = Arc::new(ScriptedModel::new());

    let orchestrator = Orchestrator::new(
        corpus.store.clone(),
        embedder,
        model,
        RoutingConfig::default(),
    )
    .unwrap();

    let rx = orchestrator.stream("What is machine learning?".to_string(), None);
    let events = collect_events(rx).await;

    // Steps, then a completion summary, then the answer.
    assert!(matches!(events[0], ProgressEventKind::ThinkingStep { step: 1, .. }));
    let complete = events
        .iter()
        .find_map(|e| match e {
            ProgressEventKind::ThinkingComplete { summary, .. } => Some(summary),
            _ => None,
        })
        .expect("thinking_complete emitted");
    assert_eq!(complete.path, "SHORT");

    match events.last().unwrap() {
        ProgressEventKind::ResponseComplete { content } => {
            assert!(content.contains("synthesized answer"));
        }
        other => panic!("expected response_complete last, got {other:?}"),
    }
}

#[tokio::test]
async fn long_path_stream_reports_subqueries() {
    let embedder = embedder();
    let corpus = seed_corpus(&embedder).await;
    let model = Arc::new(ScriptedModel::new());

    let orchestrator = Orchestrator::new(
        corpus.store.clone(),
        embedder,
        model,
        RoutingConfig::default(),
    )
    .unwrap();

    let rx = orchestrator.stream(
        "Compare the 2019 and 2021 revisions of the travel guidelines".to_string(),
        None,
    );
    let events = collect_events(rx).await;

    let summary = events
        .iter()
        .find_map(|e| match e {
            ProgressEventKind::ThinkingComplete { summary, .. } => Some(summary),
            _ => None,
        })
        .expect("thinking_complete emitted");
    assert_eq!(summary.path, "LONG");
    assert_eq!(summary.subqueries, Some(2));
    assert!(matches!(
        events.last().unwrap(),
        ProgressEventKind::ResponseComplete { .. }
    ));
}

#[tokio::test]
async fn events_serialize_with_stable_tags() {
    let embedder = embedder();
    let corpus = seed_corpus(&embedder).await;
    let model = Arc::new(ScriptedModel::new());

    let orchestrator = Orchestrator::new(
        corpus.store.clone(),
        embedder,
        model,
        RoutingConfig::default(),
    )
    .unwrap();

    let mut rx = orchestrator.stream("What is machine learning?".to_string(), None);
    let first = rx.recv().await.expect("at least one event");

    let json = serde_json::to_value(&first).unwrap();
    assert_eq!(json["type"], "thinking_step");
    assert!(json["requestId"].is_string());
    while rx.recv().await.is_some() {}
}

#[tokio::test]
async fn dropping_the_receiver_cancels_cleanly() {
    let embedder = embedder();
    let corpus = seed_corpus(&embedder).await;
    let model = Arc::new(ScriptedModel::new());

    let orchestrator = Orchestrator::new(
        corpus.store.clone(),
        embedder,
        model,
        RoutingConfig::default(),
    )
    .unwrap();

    let mut rx = orchestrator.stream("What is machine learning?".to_string(), None);
    let _ = rx.recv().await;
    drop(rx);

    // The producer stops on its next send; nothing to observe beyond the
    // absence of a panic once the runtime settles.
    tokio::task::yield_now().await;
}
