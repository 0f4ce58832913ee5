//! Scripted mock providers.
//!
//! The embedder maps topic keywords onto fixed orthogonal axes, so
//! similarity between a query and a segment is fully determined by
//! shared topics. The language model answers by prompt role (planner,
//! extractor, synthesizer) and records every call for assertions.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docent_core::{EmbeddingProvider, LanguageModel, ProviderError};

/// Embedding dimension used by the tests.
pub const DIM: usize = 8;

/// Axis reserved for text matching no known topic.
const MISC_AXIS: usize = DIM - 1;

// ============================================================================
// EMBEDDER
// ============================================================================

/// Deterministic embedder: each configured `(keyword, axis)` pair adds
/// weight on that axis when the keyword occurs in the text (case
/// insensitive); text matching nothing lands on a miscellaneous axis.
/// Vectors are normalized, so identical topic sets embed identically.
pub struct TopicEmbedder {
    topics: Vec<(&'static str, usize)>,
}

impl TopicEmbedder {
    pub fn new(topics: &[(&'static str, usize)]) -> Self {
        assert!(topics.iter().all(|(_, axis)| *axis < MISC_AXIS));
        Self {
            topics: topics.to_vec(),
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut v = vec![0.0f32; DIM];
        for (keyword, axis) in &self.topics {
            if lowered.contains(keyword) {
                v[*axis] += 1.0;
            }
        }
        if v.iter().all(|x| *x == 0.0) {
            v[MISC_AXIS] = 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    async fn embed(&self, text: &str) -> docent_core::providers::Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> docent_core::providers::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

// ============================================================================
// LANGUAGE MODEL
// ============================================================================

/// One recorded completion call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
}

impl RecordedCall {
    pub fn is_decomposition(&self) -> bool {
        self.system.contains("query planning")
    }

    pub fn is_extraction(&self) -> bool {
        self.system.starts_with("You extract")
    }

    pub fn is_synthesis(&self) -> bool {
        !self.is_decomposition() && !self.is_extraction()
    }
}

/// Role-aware scripted model. Planner prompts get a two-subquery JSON
/// plan, extractor prompts get a relevant extract, everything else gets a
/// canned cited answer. Set `fail` to make every call error.
pub struct ScriptedModel {
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
    pub fail: bool,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _temperature: f32,
        _max_tokens: Option<u32>,
    ) -> docent_core::providers::Result<String> {
        let call = RecordedCall {
            system: system_prompt.to_string(),
            user: user_prompt.to_string(),
        };
        let response = if call.is_decomposition() {
            r#"[{"query": "first facet of the question", "purpose": "establish baseline"},
                {"query": "second facet of the question", "purpose": "find changes"}]"#
                .to_string()
        } else if call.is_extraction() {
            "[§1] extracted relevant material".to_string()
        } else {
            "Here is the synthesized answer. {Machine Learning Primer} [§1]".to_string()
        };
        self.calls.lock().unwrap().push(call);

        if self.fail {
            return Err(ProviderError::Completion("scripted failure".into()));
        }
        Ok(response)
    }
}
