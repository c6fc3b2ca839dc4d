//! Memory inspection CLI commands: recall, summarize, collections, profile.

use anyhow::{Context, Result, anyhow};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tokio_util::sync::CancellationToken;

use murmur_core::memory::codec::deserialize_turns;
use murmur_types::error::RepositoryError;
use murmur_types::memory::{CollectionInfo, CollectionName, Recollection, RecordId};
use murmur_types::message::{InboundMessage, RawInboundMessage, SpeakerKind};

use crate::state::AppState;

const PREVIEW_CHARS: usize = 80;

/// Show the archived batches most similar to a message.
///
/// # Examples
///
/// ```bash
/// murmur recall --speaker Bob "what was the cat called"
/// murmur recall --category group --speaker Bob --group Hikers "trail" --json
/// ```
pub async fn recall(
    state: &AppState,
    category: &str,
    speaker: &str,
    group: Option<String>,
    text: &str,
    json: bool,
) -> Result<()> {
    let message = InboundMessage::try_from(RawInboundMessage {
        id: "cli-recall".to_string(),
        category: category.to_string(),
        speaker_name: speaker.to_string(),
        group_name: group,
        text: text.to_string(),
        media_ref: None,
    })
    .context("invalid recall target")?;

    let embedder = state.embedder().await?;
    let recollection = state.retrieval(embedder).query(&message).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recollection)?);
        return Ok(());
    }

    let items = match &recollection {
        Recollection::Found(items) if !items.is_empty() => items,
        _ => {
            println!();
            println!(
                "  {} No memory of {} yet.",
                style("i").blue().bold(),
                style(speaker).cyan(),
            );
            println!();
            return Ok(());
        }
    };

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Score").fg(Color::White),
        Cell::new("Kind").fg(Color::White),
        Cell::new("Recorded").fg(Color::White),
        Cell::new("Text").fg(Color::White),
    ]);

    for item in items {
        let kind = if item.record_id.is_profile() {
            Cell::new("profile").fg(Color::Magenta)
        } else {
            Cell::new("batch").fg(Color::Cyan)
        };
        table.add_row(vec![
            Cell::new(format!("{:.3}", item.score)),
            kind,
            Cell::new(item.created_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(preview(&item.text)),
        ]);
    }

    println!("{table}");
    Ok(())
}

/// Run one summary pass over every collection, regardless of the window.
pub async fn summarize(state: &AppState, json: bool) -> Result<()> {
    let embedder = state.embedder().await?;
    let llm = state.llm()?;
    let scheduler = state.summary_scheduler(embedder, llm);
    let report = scheduler.summarize_all(&CancellationToken::new()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    for name in &report.updated {
        println!("  {} {} profile updated", style("✓").green().bold(), style(name).cyan());
    }
    for (name, reason) in &report.skipped {
        println!(
            "  {} {} skipped ({})",
            style("-").dim(),
            style(name).cyan(),
            style(reason).dim(),
        );
    }
    for (name, error) in &report.failed {
        println!("  {} {} failed: {error}", style("x").red().bold(), style(name).cyan());
    }
    if report.updated.is_empty() && report.skipped.is_empty() && report.failed.is_empty() {
        println!("  {} No collections to summarize.", style("i").blue().bold());
    }
    println!();
    Ok(())
}

/// List every memory collection with its record count.
pub async fn list_collections(state: &AppState, json: bool) -> Result<()> {
    let names = state.store.list_collections().await?;
    let mut infos: Vec<CollectionInfo> = Vec::with_capacity(names.len());
    for name in &names {
        infos.push(state.store.open_collection(name).await?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    if infos.is_empty() {
        println!();
        println!(
            "  {} No collections yet. Memory is archived as conversations happen.",
            style("i").blue().bold(),
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Collection").fg(Color::White),
        Cell::new("Kind").fg(Color::White),
        Cell::new("Records").fg(Color::White),
    ]);

    for info in &infos {
        let kind = match info.name.kind() {
            SpeakerKind::Direct => Cell::new("direct").fg(Color::Green),
            SpeakerKind::Group => Cell::new("group").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(&info.name),
            kind,
            Cell::new(info.record_count),
        ]);
    }

    println!("{table}");
    println!("  {} collection(s)", infos.len());
    Ok(())
}

/// Print a collection's consolidated profile.
pub async fn show_profile(state: &AppState, collection: &str, json: bool) -> Result<()> {
    let name: CollectionName = collection.parse().map_err(|e: String| anyhow!(e))?;

    let record = match state.store.get_by_id(&name, RecordId::PROFILE).await {
        Ok(record) => record,
        Err(RepositoryError::NotFound) => {
            if json {
                println!("null");
            } else {
                println!();
                println!(
                    "  {} No profile for {} yet. Profiles are written by the daily summary.",
                    style("i").blue().bold(),
                    style(&name).cyan(),
                );
                println!();
            }
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read profile of '{name}'")),
    };

    if json {
        let out = serde_json::json!({
            "collection": name,
            "updated_at": record.created_at,
            "text": record.text,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} {}",
        style("Profile of").bold(),
        style(&name).cyan(),
        style(format!("(updated {})", record.created_at.format("%Y-%m-%d %H:%M"))).dim(),
    );
    println!();
    for line in record.text.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}

/// One-line preview of a record; archived batches show their first utterance.
fn preview(text: &str) -> String {
    let line = match deserialize_turns(text) {
        Ok(turns) if !turns.is_empty() => {
            let first = &turns[0];
            let more = if turns.len() > 1 {
                format!(" (+{} more)", turns.len() - 1)
            } else {
                String::new()
            };
            format!("{}: {}{more}", first.speaker_name, first.utterance_text)
        }
        _ => text.replace('\n', " "),
    };
    truncate_chars(&line, PREVIEW_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use murmur_core::memory::codec::serialize_turns;
    use murmur_types::memory::Turn;

    use super::*;

    #[test]
    fn test_truncate_chars_respects_multibyte() {
        assert_eq!(truncate_chars("short", 10), "short");
        let long = "猫".repeat(20);
        let cut = truncate_chars(&long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_preview_of_archived_batch() {
        let now = Utc::now();
        let turns: Vec<Turn> = ["first", "second"]
            .iter()
            .map(|text| {
                let message = InboundMessage::direct("m", "Bob", *text);
                Turn::from_exchange(&message, "ok", now).unwrap()
            })
            .collect();
        let text = serialize_turns(&turns).unwrap();
        assert_eq!(preview(&text), "Bob: first (+1 more)");
    }

    #[test]
    fn test_preview_of_profile_text() {
        assert_eq!(preview("Bob has a cat.\nLikes hiking."), "Bob has a cat. Likes hiking.");
    }
}
