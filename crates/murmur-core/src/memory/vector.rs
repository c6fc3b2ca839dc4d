//! Collection-oriented vector store trait.
//!
//! Defines the storage interface the memory subsystem archives into and
//! retrieves from. Implementations (LanceDB, in-process) are interchangeable
//! behind this one trait.

use chrono::{DateTime, Utc};
use murmur_types::error::RepositoryError;
use murmur_types::memory::{CollectionInfo, CollectionName, MemoryRecord, RecordId, ScoredRecord};

/// Trait for a vector store organised into named collections.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
///
/// Absence is reported as [`RepositoryError::NotFound`], an existing
/// collection or record id on create/insert as [`RepositoryError::Conflict`].
pub trait VectorStore: Send + Sync {
    /// Create an empty collection holding vectors of `dimension` floats.
    fn create_collection(
        &self,
        name: &CollectionName,
        dimension: usize,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Look up an existing collection.
    fn open_collection(
        &self,
        name: &CollectionName,
    ) -> impl std::future::Future<Output = Result<CollectionInfo, RepositoryError>> + Send;

    /// Names of every memory collection in the store.
    fn list_collections(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<CollectionName>, RepositoryError>> + Send;

    /// Add a record whose id must not yet exist in the collection.
    fn insert(
        &self,
        name: &CollectionName,
        record: &MemoryRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Replace the record with the same id, or add it if absent.
    fn upsert(
        &self,
        name: &CollectionName,
        record: &MemoryRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_by_id(
        &self,
        name: &CollectionName,
        id: RecordId,
    ) -> impl std::future::Future<Output = Result<MemoryRecord, RepositoryError>> + Send;

    /// Records with `created_at` strictly after `after`, oldest first.
    fn query_by_time_range(
        &self,
        name: &CollectionName,
        after: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<MemoryRecord>, RepositoryError>> + Send;

    /// The `k` records closest to `vector`, most similar first.
    fn query_nearest(
        &self,
        name: &CollectionName,
        vector: &[f32],
        k: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ScoredRecord>, RepositoryError>> + Send;
}
