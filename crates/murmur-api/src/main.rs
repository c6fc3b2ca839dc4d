//! murmur CLI entry point.
//!
//! Binary name: `murmur`
//!
//! Parses CLI arguments, loads configuration and the vector store, then
//! dispatches to the appropriate command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,murmur=debug",
        _ => "trace",
    };
    murmur_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Chat { no_summary } => cli::chat::run_chat(&state, no_summary, cli.json).await,
        Commands::Recall {
            category,
            speaker,
            group,
            text,
        } => {
            cli::memory::recall(&state, &category, &speaker, group, &text, cli.json).await
        }
        Commands::Summarize => cli::memory::summarize(&state, cli.json).await,
        Commands::Collections => cli::memory::list_collections(&state, cli.json).await,
        Commands::Profile { collection } => {
            cli::memory::show_profile(&state, &collection, cli.json).await
        }
    };

    murmur_observe::tracing_setup::shutdown_tracing();
    result
}
