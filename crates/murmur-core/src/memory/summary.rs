//! Daily per-partition profile summarization.
//!
//! Once per local day each collection's newly archived batches are folded,
//! by the LLM, into the collection's single profile record. A quiet day
//! leaves the profile untouched; a failure in one collection never stops
//! the others.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use dashmap::DashMap;
use murmur_types::error::{MemoryError, RepositoryError};
use murmur_types::llm::{CompletionRequest, Message};
use murmur_types::memory::{
    CollectionName, MemoryRecord, RecordId, SkipReason, SummaryOutcome, SummaryState,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::box_embedder::BoxEmbedder;
use super::box_vector::BoxVectorStore;
use super::clock::{Clock, end_of_yesterday};
use super::codec::{deserialize_turns, truncate_to_tokens};
use crate::llm::box_provider::BoxLlmProvider;

const SYSTEM_PROMPT: &str = "You maintain the long-term memory profile of one conversation. \
You merge newly recorded conversations into the existing profile and reply with the profile only.";

const EMPTY_PROFILE: &str = "(nothing known yet)";

/// Outcome of one pass over every collection.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SummaryReport {
    pub updated: Vec<CollectionName>,
    pub skipped: Vec<(CollectionName, SkipReason)>,
    pub failed: Vec<(CollectionName, String)>,
    /// The pass stopped early on cancellation.
    pub cancelled: bool,
}

/// Folds each day's archived batches into per-collection profile records.
pub struct SummaryScheduler {
    embedder: Arc<BoxEmbedder>,
    store: Arc<BoxVectorStore>,
    llm: Arc<BoxLlmProvider>,
    clock: Arc<dyn Clock>,
    model: String,
    max_tokens: u32,
    summarized_on: DashMap<CollectionName, NaiveDate>,
}

impl SummaryScheduler {
    pub fn new(
        embedder: Arc<BoxEmbedder>,
        store: Arc<BoxVectorStore>,
        llm: Arc<BoxLlmProvider>,
        clock: Arc<dyn Clock>,
        max_tokens: u32,
    ) -> Self {
        let model = llm.default_model().to_string();
        Self {
            embedder,
            store,
            llm,
            clock,
            model,
            max_tokens,
            summarized_on: DashMap::new(),
        }
    }

    /// Whether `name` has already been summarized during the current local day.
    pub fn state_of(&self, name: &CollectionName) -> SummaryState {
        let today = self.clock.now().date_naive();
        match self.summarized_on.get(name) {
            Some(day) if *day == today => SummaryState::SummarizedToday,
            _ => SummaryState::NotSummarizedToday,
        }
    }

    /// Summarize every collection, stopping between collections on cancel.
    #[tracing::instrument(skip_all)]
    pub async fn summarize_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SummaryReport, MemoryError> {
        let names = self.store.list_collections().await?;
        let mut report = SummaryReport::default();

        for name in names {
            if cancel.is_cancelled() {
                info!(remaining_from = %name, "summary pass cancelled");
                report.cancelled = true;
                break;
            }
            match self.summarize_collection(&name).await {
                Ok(SummaryOutcome::Updated { .. }) => report.updated.push(name),
                Ok(SummaryOutcome::Skipped { reason }) => report.skipped.push((name, reason)),
                Err(e) => {
                    warn!(collection = %name, error = %e, "summary failed, continuing with next collection");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        info!(
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "summary pass finished"
        );
        Ok(report)
    }

    /// Fold today's archived batches of one collection into its profile.
    #[tracing::instrument(skip(self, name), fields(collection = %name))]
    pub async fn summarize_collection(
        &self,
        name: &CollectionName,
    ) -> Result<SummaryOutcome, MemoryError> {
        if self.state_of(name) == SummaryState::SummarizedToday {
            return Ok(SummaryOutcome::Skipped {
                reason: SkipReason::AlreadySummarizedToday,
            });
        }

        let now = self.clock.now();
        let prior = self.load_profile(name).await?;
        // Batches archived after an earlier pass but before midnight belong
        // to this pass too.
        let since = match &prior {
            Some(profile) => profile.created_at.min(end_of_yesterday(now)),
            None => end_of_yesterday(now),
        };
        let todays: Vec<MemoryRecord> = self
            .store
            .query_by_time_range(name, since)
            .await?
            .into_iter()
            .filter(|record| !record.id.is_profile())
            .collect();
        if todays.is_empty() {
            info!(collection = %name, "no new conversations today, skipping");
            return Ok(SummaryOutcome::Skipped {
                reason: SkipReason::QuietDay,
            });
        }

        let prior = prior.map(|profile| profile.text).unwrap_or_default();
        let request = self.consolidation_request(&prior, &todays, now);
        let response = self.llm.complete(&request).await?;
        let summary = response.content.trim();
        if summary.is_empty() {
            warn!(collection = %name, "model returned an empty summary, keeping previous profile");
            return Ok(SummaryOutcome::Skipped {
                reason: SkipReason::EmptyResponse,
            });
        }

        let excerpt = truncate_to_tokens(summary, self.embedder.max_input_tokens());
        let vector = self.embedder.embed_text(excerpt).await?;
        let profile = MemoryRecord {
            id: RecordId::PROFILE,
            text: summary.to_string(),
            vector,
            created_at: now.with_timezone(&Utc),
        };
        self.store.upsert(name, &profile).await?;
        self.summarized_on.insert(name.clone(), now.date_naive());

        info!(collection = %name, batches = todays.len(), "profile updated");
        Ok(SummaryOutcome::Updated {
            batches: todays.len(),
        })
    }

    /// Current profile; absent or unreadable profiles count as none.
    async fn load_profile(
        &self,
        name: &CollectionName,
    ) -> Result<Option<MemoryRecord>, MemoryError> {
        match self.store.get_by_id(name, RecordId::PROFILE).await {
            Ok(record) => Ok(Some(record)),
            Err(RepositoryError::NotFound) => {
                debug!(collection = %name, "no profile yet");
                Ok(None)
            }
            Err(RepositoryError::Query(e)) => {
                warn!(collection = %name, error = %e, "profile unreadable, starting from empty");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn consolidation_request(
        &self,
        prior: &str,
        todays: &[MemoryRecord],
        now: DateTime<FixedOffset>,
    ) -> CompletionRequest {
        let date = now.date_naive();
        let known = if prior.trim().is_empty() {
            EMPTY_PROFILE
        } else {
            prior.trim()
        };
        let conversations: Vec<String> = todays
            .iter()
            .flat_map(|record| render_record(record, now.offset()))
            .collect();

        let prompt = format!(
            "Extract the important information from today's conversations and merge it into the known profile.\n\
Rules:\n\
1. Reply with the updated profile only. Keep it concise and do not explain your changes.\n\
2. Tag every fact learned today with the date {date} so facts from different days stay distinguishable.\n\
3. If there are no conversations today, return the known profile unchanged.\n\
4. Never drop previously known facts unless today's conversations update them, and remove duplicates.\n\
\n\
<known_profile>\n{known}\n</known_profile>\n\
<today date=\"{date}\">\n{}\n</today>",
            conversations.join("\n")
        );

        CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt)],
            system: Some(SYSTEM_PROMPT.to_string()),
            max_tokens: self.max_tokens,
            temperature: Some(0.2),
        }
    }
}

/// One line per archived turn; raw text if the record does not decode.
fn render_record(record: &MemoryRecord, offset: &FixedOffset) -> Vec<String> {
    match deserialize_turns(&record.text) {
        Ok(turns) => turns
            .iter()
            .map(|turn| {
                format!(
                    "{} {}: {} -> {}",
                    turn.timestamp.with_timezone(offset).format("%H:%M"),
                    turn.speaker_name,
                    turn.utterance_text,
                    turn.response_text
                )
            })
            .collect(),
        Err(_) => vec![record.text.replace('\n', " ")],
    }
}
