use anyhow::Result;
use clap::Parser; // needed for Cli::parse()

use studyloop_app::cli::commands::run_cli;
use studyloop_app::cli::opts::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    run_cli(Cli::parse()).await
}
