//! mdpress CLI: batch Markdown to HTML and PDF conversion.
//!
//! Converts every `*.md` file in `<root>/src` into `<root>/html` and
//! `<root>/pdf`, one output per source file.

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
