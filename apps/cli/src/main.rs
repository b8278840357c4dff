//! corpusfetch CLI: polite batch fetcher for a selected URL queue.
//!
//! Fetches each selected URL, extracts plain text from HTML or PDF, and
//! records one outcome per item in a JSONL stream and a CSV audit log.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
