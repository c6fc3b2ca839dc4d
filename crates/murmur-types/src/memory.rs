//! Memory domain types for murmur.
//!
//! Defines the data shapes that flow through the memory subsystem: the
//! [`PartitionKey`] identifying a conversation, the immutable [`Turn`], the
//! persisted [`MemoryRecord`] and its storage-safe [`CollectionName`], and
//! the results handed back to callers ([`Recollection`], [`SummaryOutcome`],
//! [`ArchiveReport`]).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::message::{InboundMessage, SpeakerKind};

/// Text returned in place of history when a partition has none yet.
pub const NO_MEMORY_YET: &str = "No memory of this conversation yet.";

/// Identifies one isolated conversational context.
///
/// Direct conversations are keyed by the counterpart's name, group
/// conversations by the group's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub kind: SpeakerKind,
    pub display_name: String,
}

impl PartitionKey {
    pub fn new(kind: SpeakerKind, display_name: impl Into<String>) -> Self {
        Self {
            kind,
            display_name: display_name.into(),
        }
    }

    /// Derive the partition a message belongs to.
    ///
    /// Returns `None` when the message names no correspondent at all, which
    /// callers treat as "not part of any conversation".
    pub fn from_message(message: &InboundMessage) -> Option<Self> {
        let name = match message {
            InboundMessage::Direct { speaker_name, .. } => speaker_name.trim(),
            InboundMessage::Group { group_name, .. } => group_name.trim(),
        };
        if name.is_empty() {
            return None;
        }
        Some(Self::new(message.kind(), name))
    }

    pub fn collection_name(&self) -> CollectionName {
        CollectionName::for_partition(self)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.display_name)
    }
}

/// One exchange: an inbound utterance plus the generated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub partition_key: PartitionKey,
    pub speaker_name: String,
    pub speaker_kind: SpeakerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub utterance_text: String,
    pub response_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
}

impl Turn {
    /// Build a turn from a message and the reply given to it.
    ///
    /// Returns `None` for a message that belongs to no partition.
    pub fn from_exchange(
        message: &InboundMessage,
        response: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let partition_key = PartitionKey::from_message(message)?;
        Some(Self {
            timestamp,
            partition_key,
            speaker_name: message.speaker_name().to_string(),
            speaker_kind: message.kind(),
            group_name: message.group_name().map(String::from),
            utterance_text: message.text().to_string(),
            response_text: response.into(),
            media_ref: message.media_ref().map(String::from),
        })
    }
}

/// Numeric identifier of a record within a collection.
///
/// Archive records use epoch milliseconds; [`RecordId::PROFILE`] is reserved
/// for the per-collection profile record and can never collide with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl RecordId {
    pub const PROFILE: RecordId = RecordId(1);

    pub fn is_profile(&self) -> bool {
        *self == Self::PROFILE
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted row: archive batch or profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: RecordId,
    pub text: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A record returned by a nearest-neighbor query with its similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    /// Cosine similarity, higher is closer.
    pub score: f32,
}

/// Summary of an existing collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: CollectionName,
    pub record_count: u64,
}

const MAX_SLUG_LEN: usize = 48;
const HASH_LEN: usize = 8;

/// Storage-safe collection identifier derived from a partition.
///
/// Format: `{kind}_{slug}_{hash8}`. The slug is an ASCII fold of the display
/// name (NFKD, combining marks removed, lowercase alphanumerics, other
/// scripts as `u{hex}` codepoint tokens). The hash is the first 8 hex chars
/// of SHA-256 over `kind:display_name`, so names that fold to the same slug
/// still map to distinct collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    pub fn for_partition(key: &PartitionKey) -> Self {
        let slug = fold_display_name(&key.display_name);
        let digest = Sha256::digest(format!("{}:{}", key.kind, key.display_name).as_bytes());
        let hash: String = digest
            .iter()
            .take(HASH_LEN / 2)
            .map(|b| format!("{b:02x}"))
            .collect();
        Self(format!("{}_{}_{}", key.kind, slug, hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> SpeakerKind {
        if self.0.starts_with("group_") {
            SpeakerKind::Group
        } else {
            SpeakerKind::Direct
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CollectionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("direct_")
            .or_else(|| s.strip_prefix("group_"))
            .ok_or_else(|| format!("invalid collection name: '{s}' (unknown kind prefix)"))?;
        if rest.len() < HASH_LEN + 1 {
            return Err(format!("invalid collection name: '{s}' (too short)"));
        }
        let (slug, hash) = rest.split_at(rest.len() - HASH_LEN);
        let slug = slug
            .strip_suffix('_')
            .ok_or_else(|| format!("invalid collection name: '{s}' (missing hash separator)"))?;
        if !hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(format!("invalid collection name: '{s}' (bad hash)"));
        }
        if !slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(format!("invalid collection name: '{s}' (bad slug)"));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for CollectionName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CollectionName> for String {
    fn from(name: CollectionName) -> Self {
        name.0
    }
}

/// Fold an arbitrary-script display name into `[a-z0-9_]`.
fn fold_display_name(name: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in name.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            current.push(c.to_ascii_lowercase());
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if !c.is_ascii() && !c.is_whitespace() {
            tokens.push(format!("u{:x}", c as u32));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let mut slug = tokens.join("_");
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('_') {
            slug.pop();
        }
    }
    slug
}

/// Archived text handed back by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedText {
    pub record_id: RecordId,
    pub text: String,
    pub score: f32,
    pub created_at: DateTime<Utc>,
}

impl From<ScoredRecord> for ArchivedText {
    fn from(scored: ScoredRecord) -> Self {
        Self {
            record_id: scored.record.id,
            text: scored.record.text,
            score: scored.score,
            created_at: scored.record.created_at,
        }
    }
}

/// Outcome of a retrieval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "items", rename_all = "snake_case")]
pub enum Recollection {
    /// The partition has no archived history; a normal state.
    NoMemoryYet,
    /// Matches ordered most-similar first.
    Found(Vec<ArchivedText>),
    /// A remote call failed; callers continue without history.
    Unavailable(String),
}

impl Recollection {
    /// Texts to splice into a prompt. Absent or unavailable memory yields the
    /// single "no memory yet" line so replies never block on memory.
    pub fn prompt_lines(&self) -> Vec<&str> {
        match self {
            Recollection::Found(items) if !items.is_empty() => {
                items.iter().map(|item| item.text.as_str()).collect()
            }
            _ => vec![NO_MEMORY_YET],
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Recollection::Found(items) => items.is_empty(),
            _ => true,
        }
    }
}

/// Per-collection summarization state for the current local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryState {
    NotSummarizedToday,
    SummarizedToday,
}

/// Why a collection was not summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Nothing was archived since the last day rollover.
    QuietDay,
    AlreadySummarizedToday,
    /// The model returned blank text; the profile is left untouched.
    EmptyResponse,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::QuietDay => write!(f, "quiet_day"),
            SkipReason::AlreadySummarizedToday => write!(f, "already_summarized_today"),
            SkipReason::EmptyResponse => write!(f, "empty_response"),
        }
    }
}

/// Result of summarizing one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SummaryOutcome {
    /// The profile record was replaced, folding in `batches` archive records.
    Updated { batches: usize },
    Skipped { reason: SkipReason },
}

/// Result of archiving one drained buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReport {
    pub partition: PartitionKey,
    pub archived: Vec<RecordId>,
    /// Turns lost because their batch failed to archive.
    pub dropped_turns: usize,
}

impl ArchiveReport {
    pub fn is_lossless(&self) -> bool {
        self.dropped_turns == 0
    }
}
