//! Vector storage for archived conversation batches.
//!
//! LanceDB is the persistent backend; the process-local
//! [`InMemoryVectorStore`] is selectable for throwaway runs.

pub mod archive_store;
pub mod lance;
pub mod schema;

use std::path::{Path, PathBuf};

use murmur_core::memory::box_vector::BoxVectorStore;
use murmur_core::memory::in_memory::InMemoryVectorStore;
use murmur_types::config::{VectorBackend, VectorStoreConfig};

use self::archive_store::LanceMemoryStore;
use self::lance::LanceVectorStore;

/// Build the configured vector store.
///
/// LanceDB lives at `config.path` or `{data_dir}/vector_store`.
pub async fn open_vector_store(
    config: &VectorStoreConfig,
    data_dir: &Path,
) -> Result<BoxVectorStore, lancedb::Error> {
    match config.backend {
        VectorBackend::Lance => {
            let path = config
                .path
                .as_deref()
                .map(PathBuf::from)
                .unwrap_or_else(|| LanceVectorStore::default_path(data_dir));
            let lance = LanceVectorStore::new(path).await?;
            Ok(BoxVectorStore::new(LanceMemoryStore::new(lance)))
        }
        VectorBackend::Memory => {
            tracing::warn!("using in-memory vector store; archived memory will not survive restart");
            Ok(BoxVectorStore::new(InMemoryVectorStore::new()))
        }
    }
}
