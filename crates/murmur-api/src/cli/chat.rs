//! The `murmur chat` loop.
//!
//! Reads one JSON message per stdin line, answers it with the configured
//! LLM using the conversation's live and recalled memory, and records the
//! exchange. Ctrl+C or end of input stops the background summary task and
//! archives whatever is still buffered.

use std::sync::Arc;

use anyhow::Result;
use console::style;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use murmur_core::llm::box_provider::BoxLlmProvider;
use murmur_core::memory::service::{ConversationContext, MemoryService};
use murmur_types::llm::{CompletionRequest, Message};
use murmur_types::memory::{ArchiveReport, Recollection};
use murmur_types::message::{InboundMessage, SpeakerKind};

use crate::state::AppState;

const REPLY_TEMPERATURE: f64 = 0.7;

/// One answered message, as printed in `--json` mode.
#[derive(Debug, Serialize)]
struct ChatReply<'a> {
    id: &'a str,
    reply: &'a str,
    archived: usize,
    dropped_turns: usize,
}

/// Run the chat loop until Ctrl+C or end of input.
///
/// # Examples
///
/// ```bash
/// echo '{"id":"1","category":"direct","speaker_name":"Bob","text":"hi"}' | murmur chat
/// ```
pub async fn run_chat(state: &AppState, no_summary: bool, json: bool) -> Result<()> {
    let embedder = state.embedder().await?;
    let llm = state.llm()?;
    let service = state.memory_service(embedder.clone());

    let cancel = CancellationToken::new();
    let summary_handle = if state.config.summary.enabled && !no_summary {
        let scheduler = Arc::new(state.summary_scheduler(embedder, llm.clone()));
        let task = Arc::new(state.summary_task(scheduler));
        Some(task.spawn(state.summary_period(), cancel.clone()))
    } else {
        None
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut ctrl_c => {
                tracing::info!("interrupted, shutting down chat");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let Some(message) = parse_line(&line, json) else {
            continue;
        };
        handle_message(&service, &llm, state.config.llm.max_tokens, &message, json).await?;
    }

    cancel.cancel();
    if let Some(report) = service.flush().await {
        print_flush(&report, json);
    }
    if let Some(handle) = summary_handle {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "summary task ended abnormally");
        }
    }
    Ok(())
}

/// Parse one stdin line; blank and malformed lines are skipped.
fn parse_line(line: &str, json: bool) -> Option<InboundMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<InboundMessage>(line) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed message");
            if !json {
                eprintln!("  {} Skipped malformed message: {e}", style("!").yellow().bold());
            }
            None
        }
    }
}

async fn handle_message(
    service: &MemoryService,
    llm: &BoxLlmProvider,
    max_tokens: u32,
    message: &InboundMessage,
    json: bool,
) -> Result<()> {
    let context = service.context_for(message).await;
    let request = build_reply_request(message, &context, llm.default_model(), max_tokens);

    let reply = match llm.complete(&request).await {
        Ok(response) => response.content,
        Err(e) => {
            // Nothing is recorded for a message that got no reply.
            tracing::warn!(message_id = message.id(), error = %e, "reply generation failed");
            if !json {
                eprintln!("  {} No reply to {}: {e}", style("x").red().bold(), message.id());
            }
            return Ok(());
        }
    };

    let reports = match service.record_turn(message, &reply).await {
        Ok(reports) => reports,
        Err(e) => {
            tracing::warn!(message_id = message.id(), error = %e, "turn was not recorded");
            Vec::new()
        }
    };

    if json {
        let out = ChatReply {
            id: message.id(),
            reply: &reply,
            archived: reports.iter().map(|r| r.archived.len()).sum(),
            dropped_turns: reports.iter().map(|r| r.dropped_turns).sum(),
        };
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("{} {}", style(format!("[{}]", message.id())).dim(), reply.trim());
    }
    Ok(())
}

/// Prompt the LLM with recalled history in the system prompt and the live
/// turns as prior conversation.
fn build_reply_request(
    message: &InboundMessage,
    context: &ConversationContext,
    model: &str,
    max_tokens: u32,
) -> CompletionRequest {
    let mut system = String::from(
        "You are a warm, attentive chat companion. Reply naturally and briefly.\n\
         What you remember about this conversation:\n",
    );
    for line in context.recalled.prompt_lines() {
        system.push_str("- ");
        system.push_str(line);
        system.push('\n');
    }
    if let Recollection::Unavailable(_) = context.recalled {
        system.push_str("(Long-term memory is temporarily unavailable.)\n");
    }

    let mut messages = Vec::with_capacity(context.live.len() * 2 + 1);
    for turn in &context.live {
        messages.push(Message::user(speaker_line(
            turn.speaker_kind,
            &turn.speaker_name,
            &turn.utterance_text,
        )));
        messages.push(Message::assistant(turn.response_text.clone()));
    }
    messages.push(Message::user(speaker_line(
        message.kind(),
        message.speaker_name(),
        message.text(),
    )));

    CompletionRequest {
        model: model.to_string(),
        messages,
        system: Some(system),
        max_tokens,
        temperature: Some(REPLY_TEMPERATURE),
    }
}

/// Group messages carry the speaker's name so the model can tell members apart.
fn speaker_line(kind: SpeakerKind, speaker: &str, text: &str) -> String {
    match kind {
        SpeakerKind::Direct => text.to_string(),
        SpeakerKind::Group => format!("{speaker}: {text}"),
    }
}

fn print_flush(report: &ArchiveReport, json: bool) {
    if json {
        if let Ok(out) = serde_json::to_string(report) {
            println!("{out}");
        }
        return;
    }
    println!(
        "  {} Archived {} batch(es) for {}{}",
        style("✓").green().bold(),
        report.archived.len(),
        style(&report.partition).cyan(),
        if report.is_lossless() {
            String::new()
        } else {
            format!(", {} turn(s) lost", report.dropped_turns)
        },
    );
}
