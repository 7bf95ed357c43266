//! ContentCurator CLI: score and improve a documentation tree with AI
//! providers while tracking quality and spend.

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
