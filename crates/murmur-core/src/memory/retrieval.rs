//! Semantic retrieval over a partition's archived history.
//!
//! Read-only: never touches the live buffer and never writes to the store.

use std::sync::Arc;

use murmur_types::error::{MemoryError, RepositoryError};
use murmur_types::memory::{ArchivedText, PartitionKey, Recollection};
use murmur_types::message::InboundMessage;
use tracing::debug;

use super::box_embedder::BoxEmbedder;
use super::box_vector::BoxVectorStore;
use super::codec::truncate_to_tokens;

pub struct RetrievalEngine {
    embedder: Arc<BoxEmbedder>,
    store: Arc<BoxVectorStore>,
    limit: usize,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<BoxEmbedder>, store: Arc<BoxVectorStore>, limit: usize) -> Self {
        Self {
            embedder,
            store,
            limit: limit.max(1),
        }
    }

    /// Archived batches of the message's partition most similar to its text.
    ///
    /// A partition without history yields [`Recollection::NoMemoryYet`];
    /// only embedding and store failures are errors.
    #[tracing::instrument(skip_all, fields(message_id = message.id()))]
    pub async fn query(&self, message: &InboundMessage) -> Result<Recollection, MemoryError> {
        let Some(key) = PartitionKey::from_message(message) else {
            return Ok(Recollection::NoMemoryYet);
        };
        self.query_partition(&key, message.text()).await
    }

    pub async fn query_partition(
        &self,
        key: &PartitionKey,
        text: &str,
    ) -> Result<Recollection, MemoryError> {
        let name = key.collection_name();
        match self.store.open_collection(&name).await {
            Ok(info) if info.record_count == 0 => return Ok(Recollection::NoMemoryYet),
            Ok(_) => {}
            Err(RepositoryError::NotFound) => {
                debug!(partition = %key, collection = %name, "no memory yet");
                return Ok(Recollection::NoMemoryYet);
            }
            Err(e) => return Err(e.into()),
        }
        if text.trim().is_empty() {
            return Ok(Recollection::NoMemoryYet);
        }

        let query = truncate_to_tokens(text, self.embedder.max_input_tokens());
        if query.len() < text.len() {
            debug!(
                partition = %key,
                kept = query.len(),
                total = text.len(),
                "query text truncated to embedding budget"
            );
        }
        let vector = self.embedder.embed_text(query).await?;
        let hits = match self.store.query_nearest(&name, &vector, self.limit).await {
            Ok(hits) => hits,
            Err(RepositoryError::NotFound) => return Ok(Recollection::NoMemoryYet),
            Err(e) => return Err(e.into()),
        };

        debug!(partition = %key, hits = hits.len(), "recalled archived batches");
        if hits.is_empty() {
            return Ok(Recollection::NoMemoryYet);
        }
        Ok(Recollection::Found(
            hits.into_iter().map(ArchivedText::from).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::archive::ArchiveWriter;
    use crate::memory::in_memory::InMemoryVectorStore;
    use crate::memory::test_support::{FailingEmbedder, HashEmbedder, fixed_clock, turn};
    use murmur_types::message::SpeakerKind;

    struct Fixture {
        store: Arc<BoxVectorStore>,
        writer: ArchiveWriter,
        engine: RetrievalEngine,
    }

    fn fixture(limit: usize) -> Fixture {
        let embedder = Arc::new(BoxEmbedder::new(HashEmbedder::new(256)));
        let store = Arc::new(BoxVectorStore::new(InMemoryVectorStore::new()));
        Fixture {
            writer: ArchiveWriter::new(
                embedder.clone(),
                store.clone(),
                Arc::new(fixed_clock()),
                512,
            ),
            engine: RetrievalEngine::new(embedder, store.clone(), limit),
            store,
        }
    }

    #[tokio::test]
    async fn test_missing_collection_returns_sentinel() {
        let fx = fixture(5);
        let recollection = fx
            .engine
            .query(&InboundMessage::direct("1", "Nobody", "do you remember me?"))
            .await
            .unwrap();
        assert_eq!(recollection, Recollection::NoMemoryYet);
        assert!(fx.store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_returns_most_similar_first() {
        let fx = fixture(5);
        let alice = PartitionKey::new(SpeakerKind::Direct, "Alice");
        fx.writer
            .archive(&alice, &[turn("Alice", "my cat is called Miso", "cute")])
            .await
            .unwrap();
        fx.writer
            .archive(&alice, &[turn("Alice", "I work as a nurse", "noted")])
            .await
            .unwrap();

        let recollection = fx
            .engine
            .query(&InboundMessage::direct("2", "Alice", "how is my cat Miso"))
            .await
            .unwrap();
        let Recollection::Found(items) = recollection else {
            panic!("expected matches");
        };
        assert_eq!(items.len(), 2);
        assert!(items[0].text.contains("Miso"));
        assert!(items[0].score >= items[1].score);
    }

    #[tokio::test]
    async fn test_long_message_is_cut_to_embedding_budget() {
        let fx = fixture(5);
        let alice = PartitionKey::new(SpeakerKind::Direct, "Alice");
        fx.writer
            .archive(&alice, &[turn("Alice", "my cat is called Miso", "cute")])
            .await
            .unwrap();

        let long = format!("how is my cat Miso {}", "and another thing ".repeat(500));
        let recollection = fx
            .engine
            .query(&InboundMessage::direct("6", "Alice", &long))
            .await
            .unwrap();
        let Recollection::Found(items) = recollection else {
            panic!("expected matches");
        };
        assert!(items[0].text.contains("Miso"));
    }

    #[tokio::test]
    async fn test_respects_limit_and_partition() {
        let fx = fixture(2);
        let alice = PartitionKey::new(SpeakerKind::Direct, "Alice");
        let bob = PartitionKey::new(SpeakerKind::Direct, "Bob");
        for i in 0..4 {
            fx.writer
                .archive(&alice, &[turn("Alice", &format!("fact {i}"), "ok")])
                .await
                .unwrap();
        }
        fx.writer
            .archive(&bob, &[turn("Bob", "bob secret", "ok")])
            .await
            .unwrap();

        let Recollection::Found(items) = fx
            .engine
            .query(&InboundMessage::direct("3", "Alice", "bob secret fact"))
            .await
            .unwrap()
        else {
            panic!("expected matches");
        };
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| !item.text.contains("bob secret")));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_an_error() {
        let store = Arc::new(BoxVectorStore::new(InMemoryVectorStore::new()));
        let good = Arc::new(BoxEmbedder::new(HashEmbedder::new(16)));
        let writer = ArchiveWriter::new(good, store.clone(), Arc::new(fixed_clock()), 512);
        let alice = PartitionKey::new(SpeakerKind::Direct, "Alice");
        writer
            .archive(&alice, &[turn("Alice", "hi", "hello")])
            .await
            .unwrap();

        let engine = RetrievalEngine::new(
            Arc::new(BoxEmbedder::new(FailingEmbedder::backend(16))),
            store,
            5,
        );
        let err = engine
            .query(&InboundMessage::direct("4", "Alice", "hello?"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::TransientIo(_)));
    }

    #[tokio::test]
    async fn test_unidentified_message_has_no_memory() {
        let fx = fixture(5);
        let recollection = fx
            .engine
            .query(&InboundMessage::direct("5", "", "hi"))
            .await
            .unwrap();
        assert_eq!(recollection, Recollection::NoMemoryYet);
    }
}
