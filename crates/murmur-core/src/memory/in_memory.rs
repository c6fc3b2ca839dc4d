//! Process-local vector store.
//!
//! An exact-scan `VectorStore` backed by a `DashMap` of collections. Used for
//! ephemeral runs (`vector_store.backend = "memory"`) and as the store behind
//! the memory subsystem's unit tests.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use murmur_types::error::RepositoryError;
use murmur_types::memory::{CollectionInfo, CollectionName, MemoryRecord, RecordId, ScoredRecord};

use super::vector::VectorStore;

struct Collection {
    dimension: usize,
    records: BTreeMap<RecordId, MemoryRecord>,
}

impl Collection {
    fn check_dimension(&self, record: &MemoryRecord) -> Result<(), RepositoryError> {
        if record.vector.len() != self.dimension {
            return Err(RepositoryError::Query(format!(
                "vector has {} dimensions, collection expects {}",
                record.vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

/// In-process `VectorStore` with cosine-similarity search.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: DashMap<CollectionName, Collection>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or a zero-norm input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn missing(name: &CollectionName) -> RepositoryError {
    tracing::trace!(collection = %name, "collection not found");
    RepositoryError::NotFound
}

impl VectorStore for InMemoryVectorStore {
    async fn create_collection(
        &self,
        name: &CollectionName,
        dimension: usize,
    ) -> Result<(), RepositoryError> {
        match self.collections.entry(name.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "collection '{name}' already exists"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Collection {
                    dimension,
                    records: BTreeMap::new(),
                });
                Ok(())
            }
        }
    }

    async fn open_collection(
        &self,
        name: &CollectionName,
    ) -> Result<CollectionInfo, RepositoryError> {
        let collection = self.collections.get(name).ok_or_else(|| missing(name))?;
        Ok(CollectionInfo {
            name: name.clone(),
            record_count: collection.records.len() as u64,
        })
    }

    async fn list_collections(&self) -> Result<Vec<CollectionName>, RepositoryError> {
        let mut names: Vec<CollectionName> =
            self.collections.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn insert(
        &self,
        name: &CollectionName,
        record: &MemoryRecord,
    ) -> Result<(), RepositoryError> {
        let mut collection = self.collections.get_mut(name).ok_or_else(|| missing(name))?;
        collection.check_dimension(record)?;
        if collection.records.contains_key(&record.id) {
            return Err(RepositoryError::Conflict(format!(
                "record {} already exists in '{name}'",
                record.id
            )));
        }
        collection.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn upsert(
        &self,
        name: &CollectionName,
        record: &MemoryRecord,
    ) -> Result<(), RepositoryError> {
        let mut collection = self.collections.get_mut(name).ok_or_else(|| missing(name))?;
        collection.check_dimension(record)?;
        collection.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get_by_id(
        &self,
        name: &CollectionName,
        id: RecordId,
    ) -> Result<MemoryRecord, RepositoryError> {
        let collection = self.collections.get(name).ok_or_else(|| missing(name))?;
        collection
            .records
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn query_by_time_range(
        &self,
        name: &CollectionName,
        after: DateTime<Utc>,
    ) -> Result<Vec<MemoryRecord>, RepositoryError> {
        let collection = self.collections.get(name).ok_or_else(|| missing(name))?;
        let mut records: Vec<MemoryRecord> = collection
            .records
            .values()
            .filter(|record| record.created_at > after)
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.created_at, record.id));
        Ok(records)
    }

    async fn query_nearest(
        &self,
        name: &CollectionName,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError> {
        let collection = self.collections.get(name).ok_or_else(|| missing(name))?;
        let mut scored: Vec<ScoredRecord> = collection
            .records
            .values()
            .map(|record| ScoredRecord {
                score: cosine_similarity(vector, &record.vector),
                record: record.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}
