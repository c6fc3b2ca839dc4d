//! Embedding backends.
//!
//! Local inference through fastembed, or the DashScope multimodal API for
//! deployments that also embed images.

pub mod dashscope;
pub mod fastembed;

use std::path::Path;

use secrecy::SecretString;

use murmur_core::memory::box_embedder::BoxEmbedder;
use murmur_types::config::{EmbeddingConfig, EmbeddingProvider};
use murmur_types::error::EmbeddingError;

use self::dashscope::DashScopeEmbedder;
use self::fastembed::FastEmbedEmbedder;

/// Build the configured embedder.
///
/// The local model caches its weights under `{data_dir}/models`; the remote
/// provider requires `api_key`.
pub fn create_embedder(
    config: &EmbeddingConfig,
    api_key: Option<&str>,
    data_dir: &Path,
) -> Result<BoxEmbedder, EmbeddingError> {
    match config.provider {
        EmbeddingProvider::Fastembed => {
            let embedder = FastEmbedEmbedder::new(data_dir.join("models"))?;
            Ok(BoxEmbedder::new(embedder))
        }
        EmbeddingProvider::Dashscope => {
            let key = api_key.ok_or_else(|| {
                EmbeddingError::Backend(format!("{} is not set", config.api_key_env))
            })?;
            let embedder =
                DashScopeEmbedder::new(SecretString::from(key.to_string()), config.model.clone())?;
            Ok(BoxEmbedder::new(embedder))
        }
    }
}
