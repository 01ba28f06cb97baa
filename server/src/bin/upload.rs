//! Command-line uploader: sends one slide file through the resumable
//! multipart flow of a running HistoFlow server.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use clap::Parser;
use histoflow_server::client::{
    FileSource, FileStateStore, HttpPartTransport, HttpUploadApi, RetryPolicy, UploadOptions,
    UploadSessionCoordinator,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "histoflow-upload", version, about = "Upload a slide to HistoFlow")]
struct Args {
    /// File to upload
    file: PathBuf,

    /// HistoFlow server root
    #[arg(long, env = "HISTOFLOW_URL", default_value = "http://localhost:8080")]
    server: String,

    /// Dataset name recorded with the tiling job
    #[arg(long)]
    dataset_name: Option<String>,

    /// Parts in flight at once
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Requested part size in MiB
    #[arg(long, default_value_t = 16)]
    part_size_mb: u64,

    /// Retries per part after the first attempt
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Timeout for a single part attempt, in seconds
    #[arg(long, default_value_t = 120)]
    attempt_timeout_secs: u64,

    /// Directory holding resumable session state
    #[arg(long, env = "HISTOFLOW_STATE_DIR", default_value = ".histoflow")]
    state_dir: PathBuf,

    /// Abort the saved session for this file instead of uploading
    #[arg(long)]
    abort: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "histoflow_server=info,histoflow_upload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let source = FileSource::open(&args.file).await?;
    let coordinator = UploadSessionCoordinator::new(
        Arc::new(HttpUploadApi::new(&args.server)),
        Arc::new(HttpPartTransport::new()),
        Arc::new(FileStateStore::new(&args.state_dir)),
    );

    if args.abort {
        match coordinator.abort(&source).await? {
            Some(outcome) => println!("Aborted: {:?}", outcome),
            None => println!("No saved session for {}", args.file.display()),
        }
        return Ok(());
    }

    let mut options = UploadOptions {
        concurrency: args.concurrency,
        part_size_hint: args.part_size_mb * 1024 * 1024,
        dataset_name: args.dataset_name.clone(),
        retry: RetryPolicy {
            max_retries: args.retries,
            attempt_timeout: Duration::from_secs(args.attempt_timeout_secs),
            ..RetryPolicy::default()
        },
        ..UploadOptions::default()
    };

    // Log at most once per whole percent
    let last_percent = AtomicU64::new(u64::MAX);
    options = options.with_progress(move |uploaded, total| {
        let percent = if total == 0 { 100 } else { uploaded * 100 / total };
        if last_percent.swap(percent, Ordering::Relaxed) != percent {
            info!("{}% ({} / {} bytes)", percent, uploaded, total);
        }
    });

    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping workers, progress is saved");
            cancel.cancel();
        }
    });

    let outcome = coordinator.upload(&source, &options).await?;
    println!(
        "Uploaded {} as {} ({} parts sent{})",
        args.file.display(),
        outcome.storage_key,
        outcome.parts_uploaded,
        if outcome.resumed { ", resumed" } else { "" }
    );
    if !outcome.tiling_triggered {
        println!("Tiling was not started; submit the job again once the tiling service is up");
    }
    Ok(())
}
