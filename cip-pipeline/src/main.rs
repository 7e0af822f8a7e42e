//! cip-pipeline command-line front end
//!
//! Runs pipelines, shows their state and records review decisions against the
//! database in the resolved root folder.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use cip_common::config::{resolve_root_folder, RootFolder, ROOT_FOLDER_ENV};
use cip_pipeline::artifacts::ArtifactStore;
use cip_pipeline::config::PipelineSettings;
use cip_pipeline::models::{PipelineStatus, Stage};
use cip_pipeline::services::default_collaborators;
use cip_pipeline::{db, Orchestrator, PipelineEvent, ReviewWorkflow};

/// Command-line arguments for cip-pipeline
#[derive(Parser, Debug)]
#[command(name = "cip-pipeline")]
#[command(about = "Content intelligence pipeline")]
#[command(version)]
struct Args {
    /// Root folder holding the database, settings and artifacts
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all stages for a source article
    Run {
        #[arg(long)]
        url: String,
    },
    /// List recent pipelines
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Only pipelines in this status (e.g. review_required)
        #[arg(long)]
        status: Option<PipelineStatus>,
    },
    /// Show one pipeline record
    Show { id: Uuid },
    /// Show stored stage outputs (latest per stage, or one stage's history)
    Outputs {
        id: Uuid,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=8))]
        stage: Option<u8>,
    },
    /// Show the audit log
    Audit { id: Uuid },
    /// Approve for publication
    Approve {
        id: Uuid,
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Reject with a reason
    Reject {
        id: Uuid,
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        reason: String,
    },
    /// Regenerate the article with reviewer feedback
    RequestChanges {
        id: Uuid,
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        feedback: String,
    },
    /// Create the database and schema
    SetupDb,
    /// Load the brand-voice corpus if empty
    SetupRag,
}

#[tokio::main]
async fn main() -> Result<()> {
    // API keys may live in .env
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let root_arg = args.root_folder.as_ref().map(|p| p.to_string_lossy().into_owned());
    let root = RootFolder::new(resolve_root_folder(root_arg.as_deref(), ROOT_FOLDER_ENV));
    root.ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!(root = %root.path().display(), "Root folder");

    let settings = PipelineSettings::load(&root.settings_path()).context("Failed to load settings")?;
    let pool = cip_common::db::init_database(&root.database_path())
        .await
        .context("Failed to open database")?;

    if let Command::SetupDb = args.command {
        info!(database = %root.database_path().display(), "Database ready");
        return Ok(());
    }

    let collaborators = default_collaborators(pool.clone(), &settings, root.path())
        .context("Failed to configure collaborators")?;

    if let Command::SetupRag = args.command {
        let status = collaborators
            .corpus
            .ensure_populated()
            .await
            .context("Failed to populate brand corpus")?;
        println!("Brand corpus: {} chunks (populated now: {})", status.corpus_size, status.populated);
        return Ok(());
    }

    let orchestrator = Orchestrator::new(pool, settings, collaborators, ArtifactStore::new(root.data_dir()));

    match args.command {
        Command::Run { url } => run(orchestrator, &url).await?,
        Command::List { limit, status } => {
            let records = orchestrator.list_pipelines(status, limit).await?;
            for record in records {
                println!(
                    "{}  {:<16} stage {}  score {:>5}  {}",
                    record.id,
                    record.status,
                    record.current_stage,
                    record
                        .quality_score
                        .map(|s| format!("{:.1}", s))
                        .unwrap_or_else(|| "-".to_string()),
                    record.source_url
                );
            }
        }
        Command::Show { id } => {
            let record = orchestrator.get_pipeline(id).await?;
            print_json(&record)?;
        }
        Command::Outputs { id, stage } => match stage.and_then(Stage::from_number) {
            Some(stage) => {
                orchestrator.get_pipeline(id).await?;
                let history = db::list_stage_outputs(orchestrator.pool(), id, stage).await?;
                print_json(&history)?;
            }
            None => {
                let outputs = orchestrator.get_pipeline_outputs(id).await?;
                print_json(&outputs.into_values().collect::<Vec<_>>())?;
            }
        },
        Command::Audit { id } => {
            let events = orchestrator.get_audit_log(id).await?;
            print_json(&events)?;
        }
        Command::Approve { id, reviewer, note } => {
            let record = ReviewWorkflow::new(orchestrator)
                .approve(id, &reviewer, note.as_deref())
                .await?;
            println!("Pipeline {} is now {}", record.id, record.status);
        }
        Command::Reject { id, reviewer, reason } => {
            let record = ReviewWorkflow::new(orchestrator)
                .reject(id, &reviewer, &reason)
                .await?;
            println!("Pipeline {} is now {}", record.id, record.status);
        }
        Command::RequestChanges { id, reviewer, feedback } => {
            let outcome = ReviewWorkflow::new(orchestrator)
                .request_changes(id, &reviewer, &feedback)
                .await?;
            println!(
                "Pipeline {} regenerated: {} (quality score {})",
                outcome.pipeline_id,
                outcome.status,
                outcome
                    .quality_score
                    .map(|s| format!("{:.1}", s))
                    .unwrap_or_else(|| "-".to_string())
            );
        }
        Command::SetupDb | Command::SetupRag => {}
    }

    Ok(())
}

/// Run one pipeline, printing progress; Ctrl+C cancels at the next stage boundary
async fn run(orchestrator: Orchestrator, url: &str) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(64);
    let orchestrator = orchestrator.with_events(tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling after the current stage");
            ctrl_c_token.cancel();
        }
    });

    let result = orchestrator.run_pipeline_with_cancellation(url, cancel_token).await;
    let record = match &result {
        Ok(id) => Some(orchestrator.get_pipeline(*id).await?),
        Err(_) => None,
    };

    // Closing the last sender ends the printer
    drop(orchestrator);
    let _ = printer.await;

    result?;
    if let Some(record) = record {
        println!("Status: {}", record.status);
        if let Some(risk) = record.safety_decision {
            println!("Safety: {}", risk);
        }
    }
    Ok(())
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::PipelineStarted { pipeline_id, source_url, .. } => {
            println!("Pipeline {} started for {}", pipeline_id, source_url);
        }
        PipelineEvent::StageStarted { stage, name, .. } => println!("  [{}/8] {} ...", stage, name),
        PipelineEvent::StageCompleted { stage, name, .. } => println!("  [{}/8] {} done", stage, name),
        PipelineEvent::StageFailed { stage, message, .. } => println!("  [{}/8] failed: {}", stage, message),
        PipelineEvent::Blocked { status, reasons, .. } => {
            println!("  {}:", status);
            for reason in reasons {
                println!("    - {}", reason);
            }
        }
        PipelineEvent::Cancelled { stage, .. } => println!("  cancelled before stage {}", stage),
        PipelineEvent::RegenerationStarted { pipeline_id, .. } => {
            println!("Regenerating pipeline {}", pipeline_id)
        }
        PipelineEvent::PipelineFinished {
            pipeline_id,
            status,
            quality_score,
            ..
        } => match quality_score {
            Some(score) => println!("Pipeline {} finished: {} (quality score {:.1})", pipeline_id, status, score),
            None => println!("Pipeline {} finished: {}", pipeline_id, status),
        },
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to render JSON")?);
    Ok(())
}
