//! Embedder trait for text/image-to-vector conversion.
//!
//! Implementations (local fastembed, DashScope multimodal) live in murmur-infra.

use murmur_types::error::EmbeddingError;

/// Content to embed.
#[derive(Debug, Clone, Copy)]
pub enum EmbedInput<'a> {
    Text(&'a str),
    /// Raw image bytes (JPEG/PNG).
    Image(&'a [u8]),
}

/// Trait for converting content into a fixed-dimension embedding vector.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait Embedder: Send + Sync {
    /// Embed one input into a vector of length [`Embedder::dimension`].
    ///
    /// Inputs above the model's token budget are rejected with
    /// [`EmbeddingError::InputTooLarge`], never silently truncated.
    fn embed(
        &self,
        input: EmbedInput<'_>,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// The model name used for embeddings (e.g., "BAAI/bge-small-en-v1.5").
    fn model_name(&self) -> &str;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;

    /// Maximum number of input tokens the model accepts.
    fn max_input_tokens(&self) -> usize;
}
