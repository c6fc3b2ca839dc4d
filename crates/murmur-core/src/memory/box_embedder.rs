//! `BoxEmbedder`: the runtime-selected embedding backend.
//!
//! Same shape as [`BoxLlmProvider`](crate::llm::box_provider::BoxLlmProvider):
//! a blanket `EmbedderDyn` impl boxes the `embed` future, and the wrapper
//! re-exposes the port's methods.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use murmur_types::error::EmbeddingError;

use super::embedder::{EmbedInput, Embedder};

type EmbedFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbeddingError>> + Send + 'a>>;

pub trait EmbedderDyn: Send + Sync {
    fn embed_boxed<'a>(&'a self, input: EmbedInput<'a>) -> EmbedFuture<'a>;

    fn model_name_dyn(&self) -> &str;

    fn dimension_dyn(&self) -> usize;

    fn max_input_tokens_dyn(&self) -> usize;
}

impl<T: Embedder> EmbedderDyn for T {
    fn embed_boxed<'a>(&'a self, input: EmbedInput<'a>) -> EmbedFuture<'a> {
        Box::pin(self.embed(input))
    }

    fn model_name_dyn(&self) -> &str {
        self.model_name()
    }

    fn dimension_dyn(&self) -> usize {
        self.dimension()
    }

    fn max_input_tokens_dyn(&self) -> usize {
        self.max_input_tokens()
    }
}

/// Shared as `Arc<BoxEmbedder>` by the archive, retrieval, and summary paths.
pub struct BoxEmbedder {
    inner: Box<dyn EmbedderDyn>,
}

impl BoxEmbedder {
    pub fn new<T: Embedder + 'static>(embedder: T) -> Self {
        Self {
            inner: Box::new(embedder),
        }
    }

    pub async fn embed(&self, input: EmbedInput<'_>) -> Result<Vec<f32>, EmbeddingError> {
        self.inner.embed_boxed(input).await
    }

    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(EmbedInput::Text(text)).await
    }

    pub fn model_name(&self) -> &str {
        self.inner.model_name_dyn()
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension_dyn()
    }

    /// Token budget of one input; larger inputs are rejected, not truncated.
    pub fn max_input_tokens(&self) -> usize {
        self.inner.max_input_tokens_dyn()
    }
}

impl fmt::Debug for BoxEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxEmbedder")
            .field("model", &self.model_name())
            .field("dimension", &self.dimension())
            .finish()
    }
}
