//! AutoReel command line.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use autoreel_models::{BatchEvent, Job};
use autoreel_worker::{
    build_pipeline, event_channel, init_tracing, metrics, AppConfig, BatchOrchestrator,
    EventReceiver,
};

#[derive(Parser)]
#[command(name = "autoreel")]
#[command(version, about = "Generate captioned vertical videos and publish them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a batch of generate, render and (optionally) publish iterations
    Run {
        /// Prompt sent to the text model; defaults to the built-in prompt
        #[arg(short, long)]
        prompt: Option<String>,

        /// Number of videos to make
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Only render, keep the videos in the output directory
        #[arg(long)]
        no_publish: bool,
    },

    /// Publish an existing video with the default description
    Upload {
        /// Video file to publish
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    info!("Starting autoreel with {:?}", config);

    config
        .ensure_directories()
        .context("failed to create working directories")?;
    if let Some(addr) = config.metrics_addr {
        metrics::install_exporter(addr)?;
        info!("Metrics exporter listening on {}", addr);
    }

    if matches!(cli.command, Command::Run { .. }) {
        // Checked before any batch state exists.
        config.require_api_key()?;
    }

    let (events, receiver) = event_channel();
    let orchestrator = BatchOrchestrator::new(build_pipeline(&config)?, events);

    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if stop.escalate() {
                warn!("Second interrupt, exiting");
                std::process::exit(130);
            }
            warn!("Interrupt received, stopping after the current step (Ctrl-C again to exit)");
        }
    });
    let printer = tokio::spawn(print_events(receiver));

    let ok = match cli.command {
        Command::Run {
            prompt,
            count,
            no_publish,
        } => {
            let prompt = prompt.unwrap_or_else(|| config.default_prompt.clone());
            let job = Job::new(prompt, count, !no_publish);
            let Some(handle) = orchestrator.start(job) else {
                bail!("batch was not started");
            };
            let report = handle.await.context("batch task failed")?;
            !report.iterations.iter().any(|i| i.is_failed())
        }
        Command::Upload { file } => {
            let Some(handle) = orchestrator.start_manual_upload(file) else {
                bail!("upload was not started");
            };
            handle.await.context("upload task failed")?
        }
    };

    // Dropping the orchestrator closes the channel and ends the printer.
    drop(orchestrator);
    let _ = printer.await;

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn print_events(mut receiver: EventReceiver) {
    while let Some(event) = receiver.recv().await {
        match event {
            BatchEvent::Status {
                message, progress, ..
            } => match progress {
                Some(p) => println!("[{:>3.0}%] {}", p * 100.0, message),
                None => println!("{}", message),
            },
            BatchEvent::Cooldown { remaining_secs } => {
                println!("Cooling down {}s...", remaining_secs)
            }
            BatchEvent::IterationFinished {
                index,
                outcome,
                failure,
            } => match failure {
                Some(f) => println!(
                    "Video {}: {} at {}: {}",
                    index + 1,
                    outcome.as_str(),
                    f.stage,
                    f.cause
                ),
                None => println!("Video {}: {}", index + 1, outcome.as_str()),
            },
            BatchEvent::BatchDone {
                outcome,
                completed,
                failed,
                ..
            } => println!(
                "Batch {}: {} completed, {} failed",
                outcome.as_str(),
                completed,
                failed
            ),
            BatchEvent::UploadDone { success } => {
                println!("Upload {}", if success { "succeeded" } else { "failed" })
            }
        }
    }
}
