//! FastEmbed-based local embedding generator.
//!
//! Implements the `Embedder` trait from `murmur-core` using fastembed's
//! BGESmallENV15 model (384 dimensions) with ONNX runtime inference.
//! Inference is CPU-bound and runs on the blocking thread pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use murmur_core::memory::codec::estimate_tokens;
use murmur_core::memory::embedder::{EmbedInput, Embedder};
use murmur_types::error::EmbeddingError;

/// BGESmallENV15 embedding dimension.
pub const EMBEDDING_DIMENSION: usize = 384;

/// BGE models truncate past this many tokens.
pub const MAX_INPUT_TOKENS: usize = 512;

const MODEL_NAME: &str = "BAAI/bge-small-en-v1.5";

pub struct FastEmbedEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use.
    pub fn new(cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let options = InitOptions::new(EmbeddingModel::BGESmallENV15)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(false);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::Backend(format!("failed to load {MODEL_NAME}: {e}")))?;
        tracing::info!(model = MODEL_NAME, "loaded local embedding model");

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

/// Reject text the model would otherwise silently truncate.
fn check_budget(text: &str, limit: usize) -> Result<(), EmbeddingError> {
    let tokens = estimate_tokens(text);
    if tokens > limit {
        return Err(EmbeddingError::InputTooLarge { tokens, limit });
    }
    Ok(())
}

impl Embedder for FastEmbedEmbedder {
    async fn embed(&self, input: EmbedInput<'_>) -> Result<Vec<f32>, EmbeddingError> {
        let text = match input {
            EmbedInput::Text(text) => text.to_string(),
            EmbedInput::Image(_) => {
                return Err(EmbeddingError::Backend(format!(
                    "{MODEL_NAME} embeds text only"
                )));
            }
        };
        check_budget(&text, MAX_INPUT_TOKENS)?;

        let model = self.model.clone();
        let mut vectors = tokio::task::spawn_blocking(move || {
            let mut model = model.lock().unwrap_or_else(|e| e.into_inner());
            model.embed(vec![text], None)
        })
        .await
        .map_err(|e| EmbeddingError::Backend(format!("embedding task failed: {e}")))?
        .map_err(|e| EmbeddingError::Backend(e.to_string()))?;

        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Backend("model returned no embedding".to_string()))
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    fn max_input_tokens(&self) -> usize {
        MAX_INPUT_TOKENS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_accepts_short_text() {
        assert!(check_budget("I'm 20 years old", MAX_INPUT_TOKENS).is_ok());
    }

    #[test]
    fn test_budget_rejects_long_text() {
        let text = "word ".repeat(1_000);
        match check_budget(&text, MAX_INPUT_TOKENS) {
            Err(EmbeddingError::InputTooLarge { tokens, limit }) => {
                assert!(tokens > limit);
                assert_eq!(limit, MAX_INPUT_TOKENS);
            }
            other => panic!("expected InputTooLarge, got {other:?}"),
        }
    }
}
