//! In-memory log of the live conversation.

use murmur_types::error::MemoryError;
use murmur_types::memory::{PartitionKey, Turn};

/// Ordered turns of the current partition awaiting archival.
///
/// A buffer only ever holds turns of one partition; it adopts the partition
/// of its first turn and releases it when drained.
#[derive(Debug)]
pub struct ConversationBuffer {
    partition: Option<PartitionKey>,
    turns: Vec<Turn>,
    threshold: usize,
}

impl ConversationBuffer {
    /// Create an empty buffer that asks for archival at `threshold` turns.
    pub fn new(threshold: usize) -> Self {
        Self {
            partition: None,
            turns: Vec::with_capacity(threshold + 1),
            threshold: threshold.max(1),
        }
    }

    /// Append a turn. Rejects a turn from a different partition than the
    /// one already buffered.
    pub fn append(&mut self, turn: Turn) -> Result<(), MemoryError> {
        match &self.partition {
            Some(current) if *current != turn.partition_key => {
                return Err(MemoryError::PartitionMismatch {
                    expected: current.to_string(),
                    actual: turn.partition_key.to_string(),
                });
            }
            Some(_) => {}
            None => self.partition = Some(turn.partition_key.clone()),
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Remove and return every buffered turn.
    pub fn drain(&mut self) -> Vec<Turn> {
        self.partition = None;
        std::mem::take(&mut self.turns)
    }

    pub fn size(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// True once the buffer has reached its archive threshold.
    pub fn should_archive(&self) -> bool {
        self.turns.len() >= self.threshold
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn partition(&self) -> Option<&PartitionKey> {
        self.partition.as_ref()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}
