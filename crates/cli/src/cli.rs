use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use examscore_core::{
    load_config, load_default_config, validate_config, Config, ExportArtifact, ExportKind,
    HttpScoringService, JobOrchestrator, JobStatus, NotificationLevel, PathPicker, Results,
};

use crate::summary::build_text_summary;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "EXAMSCORE_CONFIG";

#[derive(Debug, Parser, Clone)]
#[command(
    name = "examscore",
    version,
    about = "Submit exam response sheets to a scoring service and fetch the analysis"
)]
pub struct Cli {
    /// Configuration file (defaults to $EXAMSCORE_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Upload a spreadsheet, wait for the analysis and print the results
    Analyze {
        /// Exam response sheet (.xlsx or .xls)
        file: PathBuf,

        /// Export to download once the analysis completes (excel, pdf); repeatable
        #[arg(long = "export", value_name = "KIND")]
        exports: Vec<ExportKind>,

        /// Directory exports are written to
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load the service's demonstration results
    Sample {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Resolve configuration: explicit path, then $EXAMSCORE_CONFIG, then defaults.
fn resolve_config(path: Option<&Path>) -> Result<Config> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => load_default_config().context("Failed to load default configuration")?,
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

fn build_orchestrator(config: &Config) -> Result<JobOrchestrator> {
    let service = HttpScoringService::new(&config.service)
        .context("Failed to create scoring service client")?;
    info!("Scoring service at {}", service.base_url());
    Ok(JobOrchestrator::new(Arc::new(service), &config.polling))
}

/// Print notifications and progress changes to stderr until the orchestrator goes away.
fn spawn_reporters(orchestrator: &JobOrchestrator) {
    let mut notifications = orchestrator.subscribe_notifications();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(n) => {
                    let tag = match n.level {
                        NotificationLevel::Error => "error",
                        NotificationLevel::Success => "ok",
                        NotificationLevel::Info => "info",
                    };
                    eprintln!("[{}] {} {}", n.timestamp.format("%H:%M:%S"), tag, n.message);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} notifications", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut state = orchestrator.store().subscribe();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let status = state.borrow_and_update().status.clone();
            if status.status != JobStatus::Idle {
                eprintln!(
                    "{:>3}% {:<10} {}",
                    status.progress,
                    status.status.as_str(),
                    status.message
                );
            }
        }
    });
}

fn print_results(results: &Results, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(results).context("Failed to serialize results")?;
        println!("{}", out);
    } else {
        for line in build_text_summary(results) {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn save_artifact(artifact: &ExportArtifact, output_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", output_dir))?;
    let path = output_dir.join(&artifact.file_name);
    tokio::fs::write(&path, &artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

async fn analyze(
    orchestrator: &JobOrchestrator,
    file: &Path,
    exports: &[ExportKind],
    output_dir: &Path,
    json: bool,
) -> Result<()> {
    let picker = PathPicker::new(file);
    let Some(session) = orchestrator.pick_and_upload(&picker).await? else {
        info!("No file selected");
        return Ok(());
    };
    info!("Tracking session {}", session);

    let outcome = tokio::select! {
        outcome = orchestrator.wait_for_completion() => outcome,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.cancel().await;
            bail!("Interrupted, stopped tracking session {}", session);
        }
    };

    let results_loaded = outcome
        .context("No poller was tracking the session")?
        .into_result()
        .with_context(|| format!("Tracking of session {} ended", session))?;
    if !results_loaded {
        // One explicit retry before giving up.
        warn!("Results fetch failed, retrying once");
        orchestrator
            .reload_results()
            .await
            .context("Analysis completed but results could not be loaded")?;
    }

    let results = orchestrator
        .store()
        .results()
        .context("Analysis completed without results")?;
    print_results(&results, json)?;

    for kind in exports {
        let artifact = orchestrator.export(*kind).await?;
        let path = save_artifact(&artifact, output_dir).await?;
        info!("Saved {} export to {:?}", kind, path);
    }

    Ok(())
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;
    let orchestrator = build_orchestrator(&config)?;
    spawn_reporters(&orchestrator);

    match cli.command {
        Command::Analyze {
            file,
            exports,
            output_dir,
            json,
        } => analyze(&orchestrator, &file, &exports, &output_dir, json).await,
        Command::Sample { json } => {
            let results = orchestrator.load_sample().await?;
            print_results(&results, json)
        }
    }
}
