//! forumharvest CLI — forum article scraper and word counter.
//!
//! Scrapes a range of portal articles into CSV tables, counts the words of
//! the scraped text and caches the counts in a local libSQL database.

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
