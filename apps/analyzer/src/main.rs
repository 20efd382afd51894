use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use analyzer::capability::gateway::CapabilityGateway;
use analyzer::capability::{DiskFile, FileLike};
use analyzer::config::Config;
use analyzer::host;
use analyzer::models::record::ResumeRecord;
use analyzer::ops::RemoteOps;
use analyzer::pipeline::{AnalysisPipeline, AnalyzeParams};

#[derive(Parser)]
#[command(name = "analyzer", version, about = "Resume analysis pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a resume, rasterize a preview and request AI feedback.
    Analyze {
        /// Path to the resume PDF.
        #[arg(long)]
        resume: PathBuf,
        #[arg(long)]
        company: String,
        #[arg(long)]
        job_title: String,
        #[arg(long)]
        job_description: String,
    },
    /// Delete every uploaded file and flush the kv store.
    Wipe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting analyzer v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let gateway = CapabilityGateway::new();
    let ops = Arc::new(RemoteOps::new(gateway.clone()));

    let capabilities = host::connect(&config).await?;
    gateway.install(capabilities);
    ops.init().await?;
    ops.sign_in().await?;

    match cli.command {
        Command::Analyze { resume, company, job_title, job_description } => {
            let pipeline = AnalysisPipeline::new(ops.clone());

            let mut status = pipeline.status();
            let watcher = tokio::spawn(async move {
                while status.changed().await.is_ok() {
                    let text = status.borrow_and_update().clone();
                    if !text.is_empty() {
                        info!("status: {text}");
                    }
                }
            });

            let file: Arc<dyn FileLike> = Arc::new(DiskFile::new(resume));
            let id = pipeline
                .run(AnalyzeParams {
                    company_name: company,
                    job_title,
                    job_description,
                    file: Some(file),
                })
                .await?;
            watcher.abort();

            if let Some(raw) = ops.kv_get(&ResumeRecord::kv_key(id)).await? {
                let record: ResumeRecord = serde_json::from_str(&raw)?;
                if let Some(feedback) = record.feedback {
                    info!(
                        "analysis {id} complete: overall score {}/100",
                        feedback.overall_score
                    );
                }
            }
        }
        Command::Wipe => {
            let summary = ops.wipe(&config.storage_root).await?;
            info!(
                "removed {} files (kv flushed: {})",
                summary.files_deleted, summary.kv_flushed
            );
        }
    }

    Ok(())
}
