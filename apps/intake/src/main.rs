use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use intake::bulk::selection::SelectionItem;
use intake::bulk::session::BulkUploadSession;
use intake::config::Config;
use intake::models::upload::{format_file_size, EntryStatus};
use intake::screening::stage_view::{report_file_name, ScreeningStage, ScreeningStageView};
use intake::state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bulk resume intake and candidate screening", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload resumes (files or whole folders) to a job
    Upload {
        /// Target job id
        #[arg(short, long)]
        job: u64,

        /// Files and folders to stage
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List the candidates of a job at one screening stage
    List {
        /// Job id
        #[arg(short, long)]
        job: u64,

        /// `initial` or `final`
        #[arg(short, long, default_value = "initial")]
        stage: ScreeningStage,

        /// Only show the best N candidates by score
        #[arg(short, long)]
        top: Option<usize>,
    },
    /// Download the spreadsheet report of a job
    Export {
        /// Job id
        #[arg(short, long)]
        job: u64,

        /// Where to write the report; defaults to a timestamped name
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting intake v{} against {}", env!("CARGO_PKG_VERSION"), config.api_base_url);

    let state = AppState::from_config(config)?;

    match args.command {
        Command::Upload { job, paths } => upload(&state, job, paths).await,
        Command::List { job, stage, top } => list(&state, job, stage, top).await,
        Command::Export { job, out } => export(&state, job, out).await,
    }
}

async fn upload(state: &AppState, job_id: u64, paths: Vec<PathBuf>) -> Result<()> {
    let session = BulkUploadSession::new(state, job_id);
    session.open().await?;

    let items = paths
        .into_iter()
        .map(|p| {
            if p.is_dir() {
                SelectionItem::Folder(p)
            } else {
                SelectionItem::File(p)
            }
        })
        .collect();
    if session.add_selection(items).await? == 0 {
        bail!("no valid files to upload");
    }

    let outcome = session.process().await;

    for entry in state.uploads.read().await.entries() {
        let status = match entry.status {
            EntryStatus::Completed => "ok",
            EntryStatus::Error => "failed",
            EntryStatus::Pending | EntryStatus::Processing => "skipped",
        };
        let detail = entry
            .error_detail
            .as_ref()
            .map(|d| format!("  {d}"))
            .unwrap_or_default();
        println!(
            "{status:<8} {} ({}){detail}",
            entry.name,
            format_file_size(entry.size)
        );
    }

    let result = outcome?;
    println!(
        "{} of {} files processed successfully, {} failed",
        result.success_count, result.total_files, result.error_count
    );
    session.close().await?;
    Ok(())
}

async fn list(
    state: &AppState,
    job_id: u64,
    stage: ScreeningStage,
    top: Option<usize>,
) -> Result<()> {
    let mut view = ScreeningStageView::new(state, stage, job_id);
    if top.is_some() {
        view.set_top(top)?;
    }
    view.refresh().await?;

    let candidates = view.candidates().await;
    if candidates.is_empty() {
        println!("No candidates at the {stage} stage for job {job_id}");
        return Ok(());
    }
    for candidate in candidates {
        println!(
            "{:>6}  {:<24} {:>5.1}  {}",
            candidate.candidate_id, candidate.name, candidate.score, candidate.status
        );
    }
    Ok(())
}

async fn export(state: &AppState, job_id: u64, out: Option<PathBuf>) -> Result<()> {
    let view = ScreeningStageView::new(state, ScreeningStage::Final, job_id);
    let report = view.export_report().await?;

    let path = out.unwrap_or_else(|| PathBuf::from(report_file_name(Some(job_id))));
    tokio::fs::write(&path, &report)
        .await
        .with_context(|| format!("writing report to {}", path.display()))?;
    println!("Report written to {} ({})", path.display(), format_file_size(report.len() as u64));
    Ok(())
}
