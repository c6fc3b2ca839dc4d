//! The memory subsystem as one object.
//!
//! Routing and buffering happen under a single lock; embedding and store
//! calls happen after it is released.

use std::sync::Arc;

use murmur_types::error::MemoryError;
use murmur_types::memory::{ArchiveReport, Recollection, Turn};
use murmur_types::message::InboundMessage;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::archive::ArchiveWriter;
use super::buffer::ConversationBuffer;
use super::clock::Clock;
use super::partition::{FlushedBatch, PartitionRouter};
use super::retrieval::RetrievalEngine;

/// Everything the reply generator gets to see about a correspondent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationContext {
    /// Buffered, not yet archived turns of the current partition.
    pub live: Vec<Turn>,
    pub recalled: Recollection,
}

struct LiveState {
    router: PartitionRouter,
    buffer: ConversationBuffer,
}

pub struct MemoryService {
    live: Mutex<LiveState>,
    archive: ArchiveWriter,
    retrieval: RetrievalEngine,
    clock: Arc<dyn Clock>,
}

impl MemoryService {
    pub fn new(
        archive: ArchiveWriter,
        retrieval: RetrievalEngine,
        clock: Arc<dyn Clock>,
        archive_threshold: usize,
    ) -> Self {
        Self {
            live: Mutex::new(LiveState {
                router: PartitionRouter::new(),
                buffer: ConversationBuffer::new(archive_threshold),
            }),
            archive,
            retrieval,
            clock,
        }
    }

    /// Route an incoming message and return the current partition's buffer.
    ///
    /// A partition switch archives the previous partition's turns before
    /// this returns.
    pub async fn observe(&self, message: &InboundMessage) -> Vec<Turn> {
        let (flushed, live) = {
            let mut state = self.live.lock().await;
            let LiveState { router, buffer } = &mut *state;
            let routing = router.route(message, buffer);
            let live = if routing.key.is_some() {
                buffer.turns().to_vec()
            } else {
                Vec::new()
            };
            (routing.flushed, live)
        };

        if let Some(batch) = flushed {
            self.archive_flushed(batch).await;
        }
        live
    }

    /// Record an answered message, archiving whatever the turn pushes out.
    ///
    /// Returns one report per archive performed: a switch flush, a full
    /// buffer, or both.
    #[tracing::instrument(skip_all, fields(message_id = message.id()))]
    pub async fn record_turn(
        &self,
        message: &InboundMessage,
        response: &str,
    ) -> Result<Vec<ArchiveReport>, MemoryError> {
        let Some(turn) = Turn::from_exchange(message, response, self.clock.now_utc()) else {
            debug!("message has no partition, not recorded");
            return Ok(Vec::new());
        };

        let (flushed, appended, full) = {
            let mut state = self.live.lock().await;
            let LiveState { router, buffer } = &mut *state;
            let routing = router.route(message, buffer);
            let appended = buffer.append(turn);
            let full = match buffer.partition().cloned() {
                Some(partition) if buffer.should_archive() => Some(FlushedBatch {
                    partition,
                    turns: buffer.drain(),
                }),
                _ => None,
            };
            (routing.flushed, appended, full)
        };

        let mut reports = Vec::new();
        if let Some(batch) = flushed {
            reports.push(self.archive_flushed(batch).await);
        }
        appended?;
        if let Some(batch) = full {
            reports.push(self.archive_flushed(batch).await);
        }
        Ok(reports)
    }

    /// Archived history relevant to the message; failures degrade to
    /// [`Recollection::Unavailable`].
    pub async fn recall(&self, message: &InboundMessage) -> Recollection {
        match self.retrieval.query(message).await {
            Ok(recollection) => recollection,
            Err(e) => {
                warn!(message_id = message.id(), error = %e, "memory recall failed, continuing without history");
                Recollection::Unavailable(e.to_string())
            }
        }
    }

    pub async fn context_for(&self, message: &InboundMessage) -> ConversationContext {
        let live = self.observe(message).await;
        let recalled = self.recall(message).await;
        ConversationContext { live, recalled }
    }

    /// Archive whatever is buffered. Called at shutdown.
    pub async fn flush(&self) -> Option<ArchiveReport> {
        let batch = {
            let mut state = self.live.lock().await;
            let partition = state.buffer.partition().cloned()?;
            FlushedBatch {
                partition,
                turns: state.buffer.drain(),
            }
        };
        Some(self.archive_flushed(batch).await)
    }

    /// Number of buffered turns.
    pub async fn buffered(&self) -> usize {
        self.live.lock().await.buffer.size()
    }

    async fn archive_flushed(&self, batch: FlushedBatch) -> ArchiveReport {
        let report = self.archive.archive_all(&batch.partition, batch.turns).await;
        if !report.is_lossless() {
            warn!(
                partition = %report.partition,
                dropped = report.dropped_turns,
                "conversation turns lost during archiving"
            );
        }
        report
    }
}
