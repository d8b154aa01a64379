//! jobdigest CLI: harvest recent job postings into per-room digests.
//!
//! Fetches job tables, keeps postings from the last few days that a room has
//! not seen yet, and prints them as paged messages.

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
