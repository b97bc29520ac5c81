use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use studyflow_client::{
    AudioUpload, ChannelError, Config, ProgressState, SessionObserver, SessionOptions,
    SessionOrchestrator, WorkflowResult,
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "studyflow-client", version, about = "Transcribe an audio file with live progress")]
struct Cli {
    /// Audio file to transcribe (MP3, WAV, M4A, ...)
    file: PathBuf,

    /// Also generate key points and a detailed summary
    #[arg(long)]
    summary: bool,

    /// OpenAI API key used by the summarization stage
    #[arg(long)]
    api_key: Option<String>,

    /// Configuration file (without extension)
    #[arg(long, default_value = "config/studyflow-client")]
    config: String,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

/// Renders progress as a single updating console line
struct ConsoleObserver;

impl SessionObserver for ConsoleObserver {
    fn on_progress(&self, progress: &ProgressState) {
        let mut line = if progress.is_complete() {
            "Finalizing... 100%".to_string()
        } else if progress.is_started() {
            format!("Transcribing... {}%", progress.percentage)
        } else {
            "Preparing...".to_string()
        };
        if let Some(duration) = progress.duration_secs {
            line.push_str(&format!(" (Audio length: {}s)", duration.round()));
        }
        if let Some(eta) = progress.estimated_remaining_secs {
            line.push_str(&format!(" - Estimated time remaining: {}s", eta));
        }
        print!("\r{:<80}", line);
        std::io::stdout().flush().ok();
    }

    fn on_channel_failure(&self, error: &ChannelError) {
        warn!("Live progress unavailable: {}", error);
    }

    fn on_result(&self, _result: &WorkflowResult) {
        println!();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Submission endpoint: {}", cfg.server.submission_url());

    let file = AudioUpload::open(&cli.file)?;
    if let Some(duration) = file.probe_duration() {
        info!("Local duration estimate: {:.1}s", duration);
    }

    let options = SessionOptions {
        enable_summary: cli.summary,
        api_key: cli.api_key,
    };

    let orchestrator = SessionOrchestrator::new(cfg, Arc::new(ConsoleObserver))
        .context("Failed to create submission client")?;

    let result = orchestrator.start(Some(file), options).await;
    orchestrator.wait_for_teardown().await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match &result {
            WorkflowResult::Success(transcription) => {
                println!("### Transcription:\n{}", transcription.transcript);
                if let Some(summary) = &transcription.summary {
                    println!("\n### Key Points:\n{}", summary.key_points);
                    println!("\n### Detailed Summary:\n{}", summary.detailed);
                }
            }
            WorkflowResult::Failure(failure) => {
                eprintln!("{}", failure.message);
            }
        }
    }

    if !result.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
