//! Seeded corpus for journey tests.
//!
//! Three documents on disjoint topics. Segment text deliberately avoids
//! the escalation conflict indicators so journeys that should not
//! escalate stay clean; the conflicting corpus is built separately.

use std::sync::Arc;

use docent_core::{EmbeddingProvider, SqliteSegmentStore};

use crate::mocks::TopicEmbedder;

/// Topic axes shared by the corpus and the embedder.
pub const TOPICS: [(&str, usize); 3] = [
    ("machine learning", 0),
    ("remote work", 1),
    ("encryption", 2),
];

pub fn embedder() -> Arc<TopicEmbedder> {
    Arc::new(TopicEmbedder::new(&TOPICS))
}

/// Document ids of the seeded corpus, in insertion order.
pub struct SeededCorpus {
    pub store: Arc<SqliteSegmentStore>,
    pub ml_doc: i64,
    pub policy_doc: i64,
    pub security_doc: i64,
}

/// Build the standard three-document corpus.
pub async fn seed_corpus(embedder: &TopicEmbedder) -> SeededCorpus {
    let store = SqliteSegmentStore::open_in_memory().expect("in-memory store");

    let ml_doc = seed_document(
        &store,
        embedder,
        "Machine Learning Primer",
        &[
            "Machine learning is a field of study within artificial intelligence.",
            "Machine learning systems improve from examples over time.",
            "Common machine learning applications include vision and speech.",
        ],
    )
    .await;

    let policy_doc = seed_document(
        &store,
        embedder,
        "Remote Work Policy",
        &[
            "Remote work is allowed up to three days per week.",
            "Remote work requests require manager approval in advance.",
            "Equipment for remote work is provided by the company.",
        ],
    )
    .await;

    let security_doc = seed_document(
        &store,
        embedder,
        "Security Guidelines",
        &[
            "All laptops use full-disk encryption at rest.",
            "Encryption keys rotate every ninety days.",
            "Backups use the same encryption standard as primary storage.",
        ],
    )
    .await;

    SeededCorpus {
        store: Arc::new(store),
        ml_doc,
        policy_doc,
        security_doc,
    }
}

/// A two-document corpus whose retrieved context trips the contradiction
/// heuristic (two distinct conflict indicator words).
pub async fn seed_conflicting_corpus(embedder: &TopicEmbedder) -> Arc<SqliteSegmentStore> {
    let store = SqliteSegmentStore::open_in_memory().expect("in-memory store");

    seed_document(
        &store,
        embedder,
        "Remote Work Policy (2019)",
        &[
            "Remote work is allowed two days per week; however exceptions need approval.",
            "Remote work eligibility differs by department.",
        ],
    )
    .await;

    seed_document(
        &store,
        embedder,
        "Remote Work Policy (2021)",
        &[
            "Remote work is allowed three days per week.",
            "Remote work equipment is provided on request.",
        ],
    )
    .await;

    Arc::new(store)
}

async fn seed_document(
    store: &SqliteSegmentStore,
    embedder: &TopicEmbedder,
    title: &str,
    segments: &[&str],
) -> i64 {
    // Document embedding: the title plus all text, same topic space.
    let full_text = format!("{title} {}", segments.join(" "));
    let doc_embedding = embedder.embed(&full_text).await.expect("embed document");
    let doc_id = store
        .insert_document(title, Some(&doc_embedding))
        .expect("insert document");

    for (i, text) in segments.iter().enumerate() {
        let embedding = embedder.embed(text).await.expect("embed segment");
        store
            .insert_segment(doc_id, i as i64 + 1, text, &embedding)
            .expect("insert segment");
    }
    doc_id
}
