//! CLI command definitions for the `murmur` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod memory;

use clap::{Parser, Subcommand};

/// Conversational memory for a chat companion.
#[derive(Parser)]
#[command(name = "murmur", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "MURMUR_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer JSON-lines messages from stdin, remembering every exchange.
    Chat {
        /// Do not run the daily summary in the background.
        #[arg(long)]
        no_summary: bool,
    },

    /// Show archived history most similar to a message.
    Recall {
        /// Conversation category: direct or group.
        #[arg(long, default_value = "direct")]
        category: String,

        /// Speaker display name.
        #[arg(long)]
        speaker: String,

        /// Group name (group conversations only).
        #[arg(long)]
        group: Option<String>,

        /// Message text to match against.
        text: String,
    },

    /// Run the daily profile summary now, ignoring the time window.
    Summarize,

    /// List memory collections.
    #[command(alias = "ls")]
    Collections,

    /// Show the profile record of a collection.
    Profile {
        /// Collection name as shown by `murmur collections`.
        collection: String,
    },
}
