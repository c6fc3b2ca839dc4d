//! BoxVectorStore -- object-safe dynamic dispatch wrapper for VectorStore.
//!
//! Follows the same blanket-impl pattern as BoxLlmProvider:
//! 1. Define an object-safe `VectorStoreDyn` trait with boxed futures
//! 2. Blanket-impl `VectorStoreDyn` for all `T: VectorStore`
//! 3. `BoxVectorStore` wraps `Box<dyn VectorStoreDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use murmur_types::error::RepositoryError;
use murmur_types::memory::{CollectionInfo, CollectionName, MemoryRecord, RecordId, ScoredRecord};

use super::vector::VectorStore;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`VectorStore`] with boxed futures.
pub trait VectorStoreDyn: Send + Sync {
    fn create_collection_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        dimension: usize,
    ) -> BoxFuture<'a, ()>;

    fn open_collection_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
    ) -> BoxFuture<'a, CollectionInfo>;

    fn list_collections_boxed(&self) -> BoxFuture<'_, Vec<CollectionName>>;

    fn insert_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        record: &'a MemoryRecord,
    ) -> BoxFuture<'a, ()>;

    fn upsert_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        record: &'a MemoryRecord,
    ) -> BoxFuture<'a, ()>;

    fn get_by_id_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        id: RecordId,
    ) -> BoxFuture<'a, MemoryRecord>;

    fn query_by_time_range_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        after: DateTime<Utc>,
    ) -> BoxFuture<'a, Vec<MemoryRecord>>;

    fn query_nearest_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        vector: &'a [f32],
        k: usize,
    ) -> BoxFuture<'a, Vec<ScoredRecord>>;
}

impl<T: VectorStore> VectorStoreDyn for T {
    fn create_collection_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        dimension: usize,
    ) -> BoxFuture<'a, ()> {
        Box::pin(self.create_collection(name, dimension))
    }

    fn open_collection_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
    ) -> BoxFuture<'a, CollectionInfo> {
        Box::pin(self.open_collection(name))
    }

    fn list_collections_boxed(&self) -> BoxFuture<'_, Vec<CollectionName>> {
        Box::pin(self.list_collections())
    }

    fn insert_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        record: &'a MemoryRecord,
    ) -> BoxFuture<'a, ()> {
        Box::pin(self.insert(name, record))
    }

    fn upsert_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        record: &'a MemoryRecord,
    ) -> BoxFuture<'a, ()> {
        Box::pin(self.upsert(name, record))
    }

    fn get_by_id_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        id: RecordId,
    ) -> BoxFuture<'a, MemoryRecord> {
        Box::pin(self.get_by_id(name, id))
    }

    fn query_by_time_range_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        after: DateTime<Utc>,
    ) -> BoxFuture<'a, Vec<MemoryRecord>> {
        Box::pin(self.query_by_time_range(name, after))
    }

    fn query_nearest_boxed<'a>(
        &'a self,
        name: &'a CollectionName,
        vector: &'a [f32],
        k: usize,
    ) -> BoxFuture<'a, Vec<ScoredRecord>> {
        Box::pin(self.query_nearest(name, vector, k))
    }
}

/// Type-erased vector store for runtime backend selection.
///
/// Since `VectorStore` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxVectorStore` provides equivalent methods that delegate to
/// the inner `VectorStoreDyn` trait object.
pub struct BoxVectorStore {
    inner: Box<dyn VectorStoreDyn + Send + Sync>,
}

impl BoxVectorStore {
    /// Wrap a concrete `VectorStore` in a type-erased box.
    pub fn new<T: VectorStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub async fn create_collection(
        &self,
        name: &CollectionName,
        dimension: usize,
    ) -> Result<(), RepositoryError> {
        self.inner.create_collection_boxed(name, dimension).await
    }

    pub async fn open_collection(
        &self,
        name: &CollectionName,
    ) -> Result<CollectionInfo, RepositoryError> {
        self.inner.open_collection_boxed(name).await
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionName>, RepositoryError> {
        self.inner.list_collections_boxed().await
    }

    pub async fn insert(
        &self,
        name: &CollectionName,
        record: &MemoryRecord,
    ) -> Result<(), RepositoryError> {
        self.inner.insert_boxed(name, record).await
    }

    pub async fn upsert(
        &self,
        name: &CollectionName,
        record: &MemoryRecord,
    ) -> Result<(), RepositoryError> {
        self.inner.upsert_boxed(name, record).await
    }

    pub async fn get_by_id(
        &self,
        name: &CollectionName,
        id: RecordId,
    ) -> Result<MemoryRecord, RepositoryError> {
        self.inner.get_by_id_boxed(name, id).await
    }

    pub async fn query_by_time_range(
        &self,
        name: &CollectionName,
        after: DateTime<Utc>,
    ) -> Result<Vec<MemoryRecord>, RepositoryError> {
        self.inner.query_by_time_range_boxed(name, after).await
    }

    pub async fn query_nearest(
        &self,
        name: &CollectionName,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError> {
        self.inner.query_nearest_boxed(name, vector, k).await
    }
}
