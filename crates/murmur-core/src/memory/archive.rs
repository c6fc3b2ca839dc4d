//! Archive writer: persists drained conversation batches.
//!
//! A batch is serialized, checked against the embedding budget, embedded,
//! and inserted into its partition's collection under a fresh record id.
//! Collections are created lazily on first write.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use murmur_types::error::{MemoryError, RepositoryError};
use murmur_types::memory::{ArchiveReport, CollectionName, MemoryRecord, PartitionKey, RecordId, Turn};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::box_embedder::BoxEmbedder;
use super::box_vector::BoxVectorStore;
use super::clock::Clock;
use super::codec::{estimate_tokens, pack_batches, serialize_turns};

/// Hands out strictly increasing epoch-millisecond record ids.
///
/// Two archives in the same millisecond get consecutive ids; ids never fall
/// to or below [`RecordId::PROFILE`].
#[derive(Debug)]
pub struct RecordIdGenerator {
    last: AtomicI64,
}

impl Default for RecordIdGenerator {
    fn default() -> Self {
        Self {
            last: AtomicI64::new(RecordId::PROFILE.0),
        }
    }
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_at(&self, now: DateTime<Utc>) -> RecordId {
        let candidate = now.timestamp_millis();
        let step = |prev: i64| candidate.max(prev + 1);
        // fetch_update only fails when the closure returns None.
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(step(prev)))
            .unwrap_or_else(|prev| prev);
        RecordId(step(prev))
    }
}

/// Writes turn batches into per-partition collections.
pub struct ArchiveWriter {
    embedder: Arc<BoxEmbedder>,
    store: Arc<BoxVectorStore>,
    clock: Arc<dyn Clock>,
    ids: RecordIdGenerator,
    token_limit: usize,
    creation_locks: DashMap<CollectionName, Arc<Mutex<()>>>,
}

impl ArchiveWriter {
    /// `token_limit` is capped by the embedder's own input ceiling.
    pub fn new(
        embedder: Arc<BoxEmbedder>,
        store: Arc<BoxVectorStore>,
        clock: Arc<dyn Clock>,
        token_limit: usize,
    ) -> Self {
        let token_limit = token_limit.min(embedder.max_input_tokens()).max(1);
        Self {
            embedder,
            store,
            clock,
            ids: RecordIdGenerator::new(),
            token_limit,
            creation_locks: DashMap::new(),
        }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Archive one batch as a single record.
    ///
    /// The batch must be non-empty, belong entirely to `partition`, and fit
    /// the embedding budget once serialized. No retry is attempted.
    #[tracing::instrument(skip(self, partition, turns), fields(partition = %partition, turns = turns.len()))]
    pub async fn archive(
        &self,
        partition: &PartitionKey,
        turns: &[Turn],
    ) -> Result<RecordId, MemoryError> {
        if let Some(stray) = turns.iter().find(|t| t.partition_key != *partition) {
            return Err(MemoryError::PartitionMismatch {
                expected: partition.to_string(),
                actual: stray.partition_key.to_string(),
            });
        }

        let text = serialize_turns(turns)?;
        let tokens = estimate_tokens(&text);
        if tokens > self.token_limit {
            return Err(MemoryError::BatchTooLarge {
                tokens,
                limit: self.token_limit,
            });
        }

        let vector = self.embedder.embed_text(&text).await?;

        let name = partition.collection_name();
        self.ensure_collection(&name).await?;

        let created_at = self.clock.now_utc();
        let record = MemoryRecord {
            id: self.ids.next_at(created_at),
            text,
            vector,
            created_at,
        };
        self.store.insert(&name, &record).await?;

        info!(collection = %name, record_id = %record.id, tokens, "archived conversation batch");
        Ok(record.id)
    }

    /// Archive drained turns, splitting them to fit the embedding budget.
    ///
    /// Failed batches are logged and discarded; the report counts the loss.
    pub async fn archive_all(&self, partition: &PartitionKey, turns: Vec<Turn>) -> ArchiveReport {
        let total = turns.len();
        let mut report = ArchiveReport {
            partition: partition.clone(),
            archived: Vec::new(),
            dropped_turns: 0,
        };

        let batches = match pack_batches(turns, self.token_limit) {
            Ok(batches) => batches,
            Err(e) => {
                warn!(partition = %partition, error = %e, dropped = total, "could not prepare archive batches, discarding turns");
                report.dropped_turns = total;
                return report;
            }
        };

        for batch in batches {
            match self.archive(partition, &batch).await {
                Ok(id) => report.archived.push(id),
                Err(e) => {
                    warn!(partition = %partition, error = %e, dropped = batch.len(), "archive failed, discarding batch");
                    report.dropped_turns += batch.len();
                }
            }
        }
        report
    }

    /// Create the collection unless it exists. Concurrent first writes to the
    /// same collection serialize on a per-name lock.
    async fn ensure_collection(&self, name: &CollectionName) -> Result<(), MemoryError> {
        match self.store.open_collection(name).await {
            Ok(_) => return Ok(()),
            Err(RepositoryError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let lock = self.creation_locks.entry(name.clone()).or_default().clone();
        let _guard = lock.lock().await;

        match self.store.open_collection(name).await {
            Ok(_) => Ok(()),
            Err(RepositoryError::NotFound) => {
                match self
                    .store
                    .create_collection(name, self.embedder.dimension())
                    .await
                {
                    Ok(()) => {
                        info!(collection = %name, "created collection");
                        Ok(())
                    }
                    Err(RepositoryError::Conflict(_)) => {
                        debug!(collection = %name, "collection created concurrently");
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
