//! LanceDB-backed [`VectorStore`] for partition collections.
//!
//! One table per collection, cosine distance for nearest-neighbour search,
//! `score = 1 - distance`. Upsert is a single merge-insert on the id column.

use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};

use murmur_core::memory::vector::VectorStore;
use murmur_types::error::RepositoryError;
use murmur_types::memory::{CollectionInfo, CollectionName, MemoryRecord, RecordId, ScoredRecord};

use super::lance::LanceVectorStore;
use super::schema::{CREATED_AT_COLUMN, ID_COLUMN, TEXT_COLUMN, VECTOR_COLUMN, archive_schema};

pub struct LanceMemoryStore {
    store: LanceVectorStore,
}

impl LanceMemoryStore {
    pub fn new(store: LanceVectorStore) -> Self {
        Self { store }
    }

    async fn table(&self, name: &CollectionName) -> Result<lancedb::Table, RepositoryError> {
        self.store
            .open_table(name.as_str())
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to open table {name}: {e}")))?
            .ok_or(RepositoryError::NotFound)
    }

    async fn add(&self, table: &lancedb::Table, record: &MemoryRecord) -> Result<(), RepositoryError> {
        check_dimension(table, record).await?;
        let batch = build_record_batch(record)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to add record: {e}")))?;
        Ok(())
    }
}

/// Reject a record whose vector does not fit the table's vector column.
async fn check_dimension(table: &lancedb::Table, record: &MemoryRecord) -> Result<(), RepositoryError> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RepositoryError::Query(format!("Failed to read table schema: {e}")))?;
    let expected = match schema.field_with_name(VECTOR_COLUMN).map(|f| f.data_type()) {
        Ok(DataType::FixedSizeList(_, size)) => *size as usize,
        _ => {
            return Err(RepositoryError::Query(format!(
                "table {} has no '{VECTOR_COLUMN}' column",
                table.name()
            )));
        }
    };
    if record.vector.len() != expected {
        return Err(RepositoryError::Query(format!(
            "vector has {} dimensions, table {} expects {expected}",
            record.vector.len(),
            table.name()
        )));
    }
    Ok(())
}

/// Build a single-row Arrow RecordBatch from a record.
fn build_record_batch(record: &MemoryRecord) -> Result<RecordBatch, RepositoryError> {
    let dimension = i32::try_from(record.vector.len())
        .map_err(|_| RepositoryError::Query("vector too long".to_string()))?;
    let schema = Arc::new(archive_schema(dimension));

    let values = Float32Array::from(record.vector.clone());
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(field, dimension, Arc::new(values), None)
        .map_err(|e| RepositoryError::Query(format!("Failed to build vector column: {e}")))?;

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![record.id.0])),
            Arc::new(StringArray::from(vec![record.text.clone()])),
            Arc::new(Int64Array::from(vec![record.created_at.timestamp_millis()])),
            Arc::new(vector_array),
        ],
    )
    .map_err(|e| RepositoryError::Query(format!("Failed to build record batch: {e}")))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, RepositoryError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| RepositoryError::Query(format!("column '{name}' missing or mistyped")))
}

/// Parse Arrow RecordBatch rows back into records.
fn batch_to_records(batch: &RecordBatch) -> Result<Vec<MemoryRecord>, RepositoryError> {
    if batch.num_rows() == 0 {
        return Ok(vec![]);
    }

    let ids = column::<Int64Array>(batch, ID_COLUMN)?;
    let texts = column::<StringArray>(batch, TEXT_COLUMN)?;
    let created = column::<Int64Array>(batch, CREATED_AT_COLUMN)?;
    let vectors = column::<FixedSizeListArray>(batch, VECTOR_COLUMN)?;

    (0..batch.num_rows())
        .map(|i| {
            let vector = vectors.value(i);
            let vector = vector
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| RepositoryError::Query("vector items are not f32".to_string()))?;
            let created_at = DateTime::<Utc>::from_timestamp_millis(created.value(i))
                .ok_or_else(|| {
                    RepositoryError::Query(format!("invalid created_at {}", created.value(i)))
                })?;
            Ok(MemoryRecord {
                id: RecordId(ids.value(i)),
                text: texts.value(i).to_string(),
                vector: vector.values().to_vec(),
                created_at,
            })
        })
        .collect()
}

async fn collect_batches<S, E>(stream: S) -> Result<Vec<RecordBatch>, RepositoryError>
where
    S: futures_util::Stream<Item = Result<RecordBatch, E>>,
    E: std::fmt::Display,
{
    stream
        .try_collect()
        .await
        .map_err(|e| RepositoryError::Query(format!("Failed to collect results: {e}")))
}

impl VectorStore for LanceMemoryStore {
    async fn create_collection(
        &self,
        name: &CollectionName,
        dimension: usize,
    ) -> Result<(), RepositoryError> {
        let dimension = i32::try_from(dimension)
            .map_err(|_| RepositoryError::Query(format!("dimension {dimension} too large")))?;

        match self
            .store
            .create_table(name.as_str(), Arc::new(archive_schema(dimension)))
            .await
        {
            Ok(_) => Ok(()),
            Err(lancedb::Error::TableAlreadyExists { .. }) => {
                Err(RepositoryError::Conflict(format!("collection {name} exists")))
            }
            Err(e) => Err(RepositoryError::Query(format!("Failed to create table: {e}"))),
        }
    }

    async fn open_collection(&self, name: &CollectionName) -> Result<CollectionInfo, RepositoryError> {
        let table = self.table(name).await?;
        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to count rows: {e}")))?;

        Ok(CollectionInfo {
            name: name.clone(),
            record_count: count as u64,
        })
    }

    async fn list_collections(&self) -> Result<Vec<CollectionName>, RepositoryError> {
        let names = self
            .store
            .table_names()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to list tables: {e}")))?;

        let mut collections: Vec<CollectionName> =
            names.iter().filter_map(|n| n.parse().ok()).collect();
        collections.sort();
        Ok(collections)
    }

    async fn insert(&self, name: &CollectionName, record: &MemoryRecord) -> Result<(), RepositoryError> {
        let table = self.table(name).await?;
        let existing = table
            .count_rows(Some(format!("{ID_COLUMN} = {}", record.id.0)))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to check record id: {e}")))?;
        if existing > 0 {
            return Err(RepositoryError::Conflict(format!(
                "record {} exists in {name}",
                record.id
            )));
        }

        self.add(&table, record).await
    }

    async fn upsert(&self, name: &CollectionName, record: &MemoryRecord) -> Result<(), RepositoryError> {
        let table = self.table(name).await?;
        check_dimension(&table, record).await?;
        let batch = build_record_batch(record)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let mut merge = table.merge_insert(&[ID_COLUMN]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to upsert record: {e}")))?;
        Ok(())
    }

    async fn get_by_id(&self, name: &CollectionName, id: RecordId) -> Result<MemoryRecord, RepositoryError> {
        let table = self.table(name).await?;
        let results = table
            .query()
            .only_if(format!("{ID_COLUMN} = {}", id.0))
            .limit(1)
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to query record: {e}")))?;

        for batch in collect_batches(results).await? {
            if let Some(record) = batch_to_records(&batch)?.into_iter().next() {
                return Ok(record);
            }
        }
        Err(RepositoryError::NotFound)
    }

    async fn query_by_time_range(
        &self,
        name: &CollectionName,
        after: DateTime<Utc>,
    ) -> Result<Vec<MemoryRecord>, RepositoryError> {
        let table = self.table(name).await?;
        let results = table
            .query()
            .only_if(format!("{CREATED_AT_COLUMN} > {}", after.timestamp_millis()))
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Failed to query time range: {e}")))?;

        let mut records = Vec::new();
        for batch in collect_batches(results).await? {
            records.extend(batch_to_records(&batch)?);
        }
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }

    async fn query_nearest(
        &self,
        name: &CollectionName,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>, RepositoryError> {
        let table = self.table(name).await?;
        let results = table
            .vector_search(vector)
            .map_err(|e| RepositoryError::Query(format!("Vector search setup failed: {e}")))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("Vector search failed: {e}")))?;

        let mut scored = Vec::new();
        for batch in collect_batches(results).await? {
            // The _distance column is added by LanceDB vector search
            let distances = column::<Float32Array>(&batch, "_distance")?;
            for (i, record) in batch_to_records(&batch)?.into_iter().enumerate() {
                scored.push(ScoredRecord {
                    record,
                    score: 1.0 - distances.value(i),
                });
            }
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use murmur_types::memory::PartitionKey;
    use murmur_types::message::SpeakerKind;

    async fn store() -> (tempfile::TempDir, LanceMemoryStore) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let lance = LanceVectorStore::new(dir.path().to_path_buf())
            .await
            .expect("Failed to create vector store");
        (dir, LanceMemoryStore::new(lance))
    }

    fn alice() -> CollectionName {
        PartitionKey::new(SpeakerKind::Direct, "Alice").collection_name()
    }

    fn record(id: i64, text: &str, vector: [f32; 3], created_at: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord {
            id: RecordId(id),
            text: text.to_string(),
            vector: vector.to_vec(),
            created_at: DateTime::from_timestamp_millis(created_at.timestamp_millis()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_found() {
        let (_dir, store) = store().await;
        assert!(matches!(
            store.open_collection(&alice()).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            store.query_nearest(&alice(), &[1.0, 0.0, 0.0], 5).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_create_twice_conflicts_and_lists_once() {
        let (_dir, store) = store().await;
        store.create_collection(&alice(), 3).await.unwrap();
        assert!(matches!(
            store.create_collection(&alice(), 3).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(store.list_collections().await.unwrap(), vec![alice()]);
        assert_eq!(store.open_collection(&alice()).await.unwrap().record_count, 0);
    }

    #[tokio::test]
    async fn test_insert_get_and_duplicate_id() {
        let (_dir, store) = store().await;
        store.create_collection(&alice(), 3).await.unwrap();
        let rec = record(1_700_000_000_000, "hello", [1.0, 0.0, 0.0], Utc::now());

        store.insert(&alice(), &rec).await.unwrap();
        assert_eq!(store.get_by_id(&alice(), rec.id).await.unwrap(), rec);
        assert!(matches!(
            store.insert(&alice(), &rec).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            store.get_by_id(&alice(), RecordId::PROFILE).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_upsert_replaces_profile() {
        let (_dir, store) = store().await;
        store.create_collection(&alice(), 3).await.unwrap();
        let now = Utc::now();

        store
            .upsert(&alice(), &record(1, "old profile", [0.0, 1.0, 0.0], now))
            .await
            .unwrap();
        store
            .upsert(&alice(), &record(1, "new profile", [0.0, 0.0, 1.0], now))
            .await
            .unwrap();

        assert_eq!(store.open_collection(&alice()).await.unwrap().record_count, 1);
        let profile = store.get_by_id(&alice(), RecordId::PROFILE).await.unwrap();
        assert_eq!(profile.text, "new profile");
    }

    #[tokio::test]
    async fn test_rejected_upsert_keeps_previous_profile() {
        let (_dir, store) = store().await;
        store.create_collection(&alice(), 3).await.unwrap();
        let now = Utc::now();
        store
            .upsert(&alice(), &record(1, "known profile", [0.0, 1.0, 0.0], now))
            .await
            .unwrap();

        let wider = MemoryRecord {
            vector: vec![0.0, 0.0, 0.0, 1.0],
            ..record(1, "from another model", [0.0, 0.0, 0.0], now)
        };
        assert!(matches!(
            store.upsert(&alice(), &wider).await,
            Err(RepositoryError::Query(_))
        ));
        assert!(matches!(
            store.insert(&alice(), &MemoryRecord { id: RecordId(2), ..wider }).await,
            Err(RepositoryError::Query(_))
        ));

        let profile = store.get_by_id(&alice(), RecordId::PROFILE).await.unwrap();
        assert_eq!(profile.text, "known profile");
        assert_eq!(store.open_collection(&alice()).await.unwrap().record_count, 1);
    }

    #[tokio::test]
    async fn test_time_range_is_strict_and_ordered() {
        let (_dir, store) = store().await;
        store.create_collection(&alice(), 3).await.unwrap();
        let base = Utc::now();

        for (offset, id) in [(2, 30), (0, 10), (1, 20)] {
            let at = base + Duration::seconds(offset);
            store
                .insert(&alice(), &record(id, "batch", [1.0, 0.0, 0.0], at))
                .await
                .unwrap();
        }

        let after = DateTime::from_timestamp_millis(base.timestamp_millis()).unwrap();
        let ids: Vec<i64> = store
            .query_by_time_range(&alice(), after)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id.0)
            .collect();
        assert_eq!(ids, vec![20, 30]);
    }

    #[tokio::test]
    async fn test_nearest_orders_by_similarity() {
        let (_dir, store) = store().await;
        store.create_collection(&alice(), 3).await.unwrap();
        let now = Utc::now();
        store
            .insert(&alice(), &record(10, "x axis", [1.0, 0.0, 0.0], now))
            .await
            .unwrap();
        store
            .insert(&alice(), &record(20, "y axis", [0.0, 1.0, 0.0], now))
            .await
            .unwrap();
        store
            .insert(&alice(), &record(30, "mostly x", [0.9, 0.1, 0.0], now))
            .await
            .unwrap();

        let hits = store.query_nearest(&alice(), &[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.text, "x axis");
        assert_eq!(hits[1].record.text, "mostly x");
        assert!(hits[0].score >= hits[1].score);
        assert!((hits[0].score - 1.0).abs() < 1e-4);
    }
}
