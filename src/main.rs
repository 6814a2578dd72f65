//! netcarve CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use netcarve::cli::{self, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_filter().into()))
        .with_writer(std::io::stderr)
        .init();

    let analysis = cli::run(&args).await?;
    if analysis.summary.cancelled {
        anyhow::bail!("analysis cancelled before completion");
    }
    Ok(())
}
