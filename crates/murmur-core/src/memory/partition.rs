//! Partition routing and switch detection.
//!
//! The inbound stream is a single sequence of messages from many
//! conversations. `PartitionRouter` tracks which partition is current and,
//! when a message arrives for a different one, hands back whatever the
//! buffer held so it can be archived before any turn of the new partition
//! is appended.

use murmur_types::memory::{PartitionKey, Turn};
use murmur_types::message::InboundMessage;
use tracing::debug;

use super::buffer::ConversationBuffer;

/// Turns drained from the buffer, labelled with the partition they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushedBatch {
    pub partition: PartitionKey,
    pub turns: Vec<Turn>,
}

/// Result of routing one message.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Routing {
    /// Partition of the message, `None` if it names no correspondent.
    pub key: Option<PartitionKey>,
    /// Previous partition's turns, present only on a switch.
    pub flushed: Option<FlushedBatch>,
}

impl Routing {
    pub fn switched(&self) -> bool {
        self.flushed.is_some()
    }
}

/// Tracks the currently active partition of the inbound stream.
#[derive(Debug, Default)]
pub struct PartitionRouter {
    last_partition: Option<PartitionKey>,
}

impl PartitionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_partition(&self) -> Option<&PartitionKey> {
        self.last_partition.as_ref()
    }

    /// Route a message, draining `buffer` if the partition changed.
    ///
    /// Callers must hold exclusive access to both the router and the buffer
    /// for the whole call; the compare, drain, and cursor update form one
    /// critical section. A message with no partition is a no-op.
    pub fn route(&mut self, message: &InboundMessage, buffer: &mut ConversationBuffer) -> Routing {
        let Some(key) = PartitionKey::from_message(message) else {
            return Routing::default();
        };

        let mut flushed = None;
        if self.last_partition.as_ref() != Some(&key) && !buffer.is_empty() {
            let partition = buffer
                .partition()
                .cloned()
                .or_else(|| self.last_partition.clone());
            let turns = buffer.drain();
            if let Some(partition) = partition {
                debug!(from = %partition, to = %key, turns = turns.len(), "partition switch");
                flushed = Some(FlushedBatch { partition, turns });
            }
        }

        self.last_partition = Some(key.clone());
        Routing {
            key: Some(key),
            flushed,
        }
    }
}
