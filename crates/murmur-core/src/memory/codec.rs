//! Turn batch serialization and embedding-budget accounting.
//!
//! An archive record stores its turns as a JSON array. The same text is what
//! gets embedded, so its token estimate decides whether a batch fits the
//! embedding model's input ceiling.

use murmur_types::error::MemoryError;
use murmur_types::memory::Turn;

/// Serialize a non-empty batch of turns, preserving order.
pub fn serialize_turns(turns: &[Turn]) -> Result<String, MemoryError> {
    if turns.is_empty() {
        return Err(MemoryError::Serialization(
            "cannot serialize an empty batch".to_string(),
        ));
    }
    serde_json::to_string(turns).map_err(|e| MemoryError::Serialization(e.to_string()))
}

pub fn deserialize_turns(text: &str) -> Result<Vec<Turn>, MemoryError> {
    serde_json::from_str(text).map_err(|e| MemoryError::Serialization(e.to_string()))
}

/// Conservative token estimate for embedding input.
///
/// ASCII is counted at three bytes per token (JSON punctuation tokenizes
/// densely); every non-ASCII char counts as a full token.
pub fn estimate_tokens(text: &str) -> usize {
    let (ascii, other) = text
        .chars()
        .fold((0usize, 0usize), |(ascii, other), c| {
            if c.is_ascii() {
                (ascii + 1, other)
            } else {
                (ascii, other + 1)
            }
        });
    ascii.div_ceil(3) + other
}

/// Longest char-boundary prefix of `text` whose estimate fits `max_tokens`.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    let (mut ascii, mut other) = (0usize, 0usize);
    for (idx, c) in text.char_indices() {
        if c.is_ascii() {
            ascii += 1;
        } else {
            other += 1;
        }
        if ascii.div_ceil(3) + other > max_tokens {
            return &text[..idx];
        }
    }
    text
}

/// Split turns into consecutive batches whose serialized form fits `limit`.
///
/// Greedy and order-preserving. A single turn that alone exceeds the limit
/// is still emitted as its own batch; the archive writer rejects it.
pub fn pack_batches(turns: Vec<Turn>, limit: usize) -> Result<Vec<Vec<Turn>>, MemoryError> {
    let mut batches = Vec::new();
    let mut current: Vec<Turn> = Vec::new();

    for turn in turns {
        current.push(turn);
        if current.len() == 1 {
            continue;
        }
        if estimate_tokens(&serialize_turns(&current)?) > limit {
            let overflow = current.pop();
            batches.push(std::mem::take(&mut current));
            current.extend(overflow);
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}
