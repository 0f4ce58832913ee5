//! Local Semantic Embeddings
//!
//! ONNX-based local inference via fastembed - no external API calls.
//! The model instance is owned by the provider (no global state) and
//! guarded by a mutex because the fastembed API embeds through `&mut`.
//!
//! Output vectors are Matryoshka-truncated from the model's native 768
//! dimensions to 256 and re-normalized: 3x storage savings for ~2%
//! retrieval quality loss.

use std::sync::Mutex;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::providers::{EmbeddingProvider, ProviderError, Result};

/// Embedding dimensions after Matryoshka truncation.
pub const EMBEDDING_DIMENSIONS: usize = 256;

/// Maximum text length submitted for embedding (longer input is cut).
pub const MAX_TEXT_LENGTH: usize = 8192;

/// Batch size for embed_batch calls.
pub const BATCH_SIZE: usize = 32;

/// Locally-running embedding provider.
pub struct LocalEmbedder {
    model: Mutex<TextEmbedding>,
}

impl LocalEmbedder {
    /// Initialize the model, downloading weights to the cache directory
    /// on first use. The directory comes from `FASTEMBED_CACHE_PATH` or
    /// the platform cache location.
    pub fn new() -> Result<Self> {
        let cache_dir = cache_dir();
        if let Err(e) = std::fs::create_dir_all(&cache_dir) {
            tracing::warn!("failed to create embedding cache dir {cache_dir:?}: {e}");
        }

        let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
            .with_show_download_progress(false)
            .with_cache_dir(cache_dir);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| ProviderError::Embedding(format!("model init failed: {e}")))?;

        Ok(Self {
            model: Mutex::new(model),
        })
    }

    fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut model = self
            .model
            .lock()
            .map_err(|e| ProviderError::Embedding(format!("model lock poisoned: {e}")))?;

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let embedded = model
                .embed(batch.to_vec(), None)
                .map_err(|e| ProviderError::Embedding(e.to_string()))?;
            out.extend(embedded.into_iter().map(|v| matryoshka_truncate(&v)));
        }
        Ok(out)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(vec![clip(text)])?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::Embedding("model returned no vector".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_texts(texts.iter().map(|t| clip(t)).collect())
    }
}

/// Keep the first `EMBEDDING_DIMENSIONS` components and re-normalize.
/// With a Matryoshka-trained model the prefix IS the lower-dimensional
/// representation.
pub fn matryoshka_truncate(vector: &[f32]) -> Vec<f32> {
    let mut truncated: Vec<f32> =
        vector.iter().take(EMBEDDING_DIMENSIONS).copied().collect();
    let norm: f32 = truncated.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut truncated {
            *x /= norm;
        }
    }
    truncated
}

fn clip(text: &str) -> String {
    if text.len() <= MAX_TEXT_LENGTH {
        return text.to_string();
    }
    let mut end = MAX_TEXT_LENGTH;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("FASTEMBED_CACHE_PATH") {
        return std::path::PathBuf::from(path);
    }
    if let Some(dirs) = directories::ProjectDirs::from("ai", "docent", "docent") {
        return dirs.cache_dir().join("fastembed");
    }
    std::path::PathBuf::from(".fastembed_cache")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matryoshka_truncate_normalizes() {
        let vector: Vec<f32> = (0..768).map(|i| (i as f32 + 1.0).recip()).collect();
        let truncated = matryoshka_truncate(&vector);
        assert_eq!(truncated.len(), EMBEDDING_DIMENSIONS);
        let norm: f32 = truncated.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_matryoshka_truncate_short_input() {
        let truncated = matryoshka_truncate(&[3.0, 4.0]);
        assert_eq!(truncated.len(), 2);
        assert!((truncated[0] - 0.6).abs() < 1e-6);
        assert!((truncated[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        let text = "é".repeat(MAX_TEXT_LENGTH); // 2 bytes per char
        let clipped = clip(&text);
        assert!(clipped.len() <= MAX_TEXT_LENGTH);
        assert!(text.starts_with(&clipped));
    }
}
