//! Deterministic port fakes for the memory subsystem's tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use murmur_types::error::EmbeddingError;
use murmur_types::llm::{CompletionRequest, CompletionResponse, LlmError, StopReason, Usage};
use murmur_types::memory::{PartitionKey, Turn};
use murmur_types::message::SpeakerKind;

use super::clock::FixedClock;
use super::codec::estimate_tokens;
use super::embedder::{EmbedInput, Embedder};
use crate::llm::provider::LlmProvider;

pub fn offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

/// 2026-03-10 14:00 +08:00.
pub fn fixed_now() -> DateTime<FixedOffset> {
    offset().with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap()
}

pub fn fixed_clock() -> FixedClock {
    FixedClock::new(fixed_now())
}

/// A direct-conversation turn with `name` as the partition.
pub fn turn(name: &str, utterance: &str, response: &str) -> Turn {
    Turn {
        timestamp: Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap(),
        partition_key: PartitionKey::new(SpeakerKind::Direct, name),
        speaker_name: name.to_string(),
        speaker_kind: SpeakerKind::Direct,
        group_name: None,
        utterance_text: utterance.to_string(),
        response_text: response.to_string(),
        media_ref: None,
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Hashed bag-of-words embedder; texts sharing words land close together.
///
/// Like the real backends it refuses text over its input budget.
pub struct HashEmbedder {
    dimension: usize,
    calls: Arc<AtomicUsize>,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `embed` invocations.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Embedder for HashEmbedder {
    async fn embed(&self, input: EmbedInput<'_>) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0f32; self.dimension];
        let text = match input {
            EmbedInput::Text(text) if estimate_tokens(text) > self.max_input_tokens() => {
                return Err(EmbeddingError::InputTooLarge {
                    tokens: estimate_tokens(text),
                    limit: self.max_input_tokens(),
                });
            }
            EmbedInput::Text(text) => text.to_lowercase(),
            EmbedInput::Image(bytes) => format!("image {}", bytes.len()),
        };
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[(fnv1a(word) % self.dimension as u64) as usize] += 1.0;
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_input_tokens(&self) -> usize {
        512
    }
}

/// Embedder that always fails with a fixed error kind.
pub struct FailingEmbedder {
    dimension: usize,
    rate_limited: bool,
}

impl FailingEmbedder {
    pub fn rate_limited(dimension: usize) -> Self {
        Self {
            dimension,
            rate_limited: true,
        }
    }

    pub fn backend(dimension: usize) -> Self {
        Self {
            dimension,
            rate_limited: false,
        }
    }
}

impl Embedder for FailingEmbedder {
    async fn embed(&self, _input: EmbedInput<'_>) -> Result<Vec<f32>, EmbeddingError> {
        if self.rate_limited {
            Err(EmbeddingError::RateLimited {
                retry_after_ms: Some(1_000),
            })
        } else {
            Err(EmbeddingError::Backend("connection reset".to_string()))
        }
    }

    fn model_name(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_input_tokens(&self) -> usize {
        512
    }
}

fn section<'a>(prompt: &'a str, open: &str, close: &str) -> &'a str {
    prompt
        .find(open)
        .and_then(|start| {
            let body = &prompt[start + open.len()..];
            body.find(close).map(|end| &body[..end])
        })
        .unwrap_or("")
}

/// Canned consolidating model.
///
/// Keeps every known profile line, appends each of today's lines tagged with
/// the day's date unless already present, and can be told to fail or return
/// blank text for prompts mentioning a given word.
#[derive(Default)]
pub struct MergingLlm {
    fail_on: Option<String>,
    blank: bool,
    calls: Arc<AtomicUsize>,
}

impl MergingLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(word: &str) -> Self {
        Self {
            fail_on: Some(word.to_string()),
            ..Self::default()
        }
    }

    pub fn blank() -> Self {
        Self {
            blank: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn merge(prompt: &str) -> String {
        let known = section(prompt, "<known_profile>\n", "\n</known_profile>");
        let today_block = prompt
            .find("<today date=")
            .map(|start| &prompt[start..])
            .unwrap_or("");
        let date = section(today_block, "<today date=\"", "\">");
        let today = section(today_block, "\">\n", "\n</today>");

        let mut lines: Vec<String> = known
            .lines()
            .filter(|line| !line.trim().is_empty() && !line.starts_with('('))
            .map(String::from)
            .collect();
        for line in today.lines().filter(|line| !line.trim().is_empty()) {
            let tagged = format!("[{date}] {}", line.trim());
            if !lines.contains(&tagged) {
                lines.push(tagged);
            }
        }
        lines.join("\n")
    }
}

impl LlmProvider for MergingLlm {
    fn name(&self) -> &str {
        "merging-stub"
    }

    fn default_model(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(word) = &self.fail_on {
            if prompt.contains(word.as_str()) {
                return Err(LlmError::Provider {
                    message: format!("refusing prompt mentioning {word}"),
                });
            }
        }

        let content = if self.blank {
            "   ".to_string()
        } else {
            Self::merge(&prompt)
        };
        Ok(CompletionResponse {
            id: "stub-1".to_string(),
            content,
            model: "stub".to_string(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }
}
