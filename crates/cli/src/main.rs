mod cli;
mod summary;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();
    init_logging(args.log_json);

    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only results.
fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(args: cli::Cli) -> Result<()> {
    cli::run(args).await
}
