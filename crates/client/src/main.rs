// crates/client/src/main.rs
//! `larder-import`: submit files to a larder server and follow the import.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use larder_client::{
    load_upload, ClientPhase, HttpImportApi, ImportApi, ImportSession, PollConfig, PollGuard,
    TerminalView,
};
use larder_observability::{init_tracing, LogFormat};

#[derive(Parser)]
#[command(name = "larder-import")]
#[command(about = "Import recipes from photos and PDFs", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(long, env = "LARDER_URL", default_value = "http://127.0.0.1:47910")]
    server: String,

    /// User id to import as
    #[arg(long, env = "LARDER_USER")]
    user: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and follow the import until it finishes
    Submit {
        file: PathBuf,
        /// Extract a single image immediately instead of queueing a job
        #[arg(long)]
        fast_path: bool,
        /// Override the content type guessed from the file extension
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Print a job's current state
    Status { job_id: String },
    /// Follow an existing job until it finishes
    Watch { job_id: String },
    /// Cancel a job
    Cancel { job_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("warn", LogFormat::from_env());

    let cli = Cli::parse();
    let api = Arc::new(
        HttpImportApi::new(&cli.server, cli.user, Duration::from_secs(cli.timeout))
            .context("failed to build HTTP client")?,
    );

    match cli.command {
        Commands::Submit {
            file,
            fast_path,
            content_type,
        } => {
            let upload = load_upload(&file, content_type.as_deref()).await?;
            let session = ImportSession::new(api, Arc::new(TerminalView::new()), PollConfig::default());
            follow(session.submit(upload, fast_path)).await
        }
        Commands::Watch { job_id } => {
            let session = ImportSession::new(api, Arc::new(TerminalView::new()), PollConfig::default());
            follow(session.resume(job_id)).await
        }
        Commands::Status { job_id } => {
            let snapshot = api.status(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Cancel { job_id } => {
            api.cancel(&job_id).await?;
            println!("Cancel requested for {job_id}");
            Ok(())
        }
    }
}

/// Wait for the import to settle. Ctrl-C detaches; the job keeps running.
async fn follow(mut guard: PollGuard) -> Result<()> {
    let settled = tokio::select! {
        phase = guard.wait() => Some(phase?),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(phase) = settled else {
        match guard.detach() {
            Some(job_id) => eprintln!("\nDetached. Resume with: larder-import watch {job_id}"),
            None => eprintln!("\nDetached before the server assigned a job id."),
        }
        return Ok(());
    };

    match phase {
        ClientPhase::Failed(reason) => bail!("{reason}"),
        _ => Ok(()),
    }
}
