//! Scamwatch CLI
//!
//! Runs the alert gateway, or analyzes a single input from the terminal.

mod output;
mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use scamwatch_core::{BroadcastHub, CommandConfig, Config, Envelope, Orchestrator};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::server::AppState;

#[derive(Parser)]
#[command(name = "scamwatch")]
#[command(author = "Scamwatch Team")]
#[command(version)]
#[command(about = "Scamwatch - multi-modal scam and deepfake alerts", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true, env = "SCAMWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/WebSocket gateway
    Serve {
        /// Listen address
        #[arg(short, long, env = "SCAMWATCH_BIND")]
        bind: Option<String>,

        /// Frames sampled per video
        #[arg(long, env = "SCAMWATCH_FRAME_CAP")]
        frame_cap: Option<usize>,

        /// Speech-to-text command (receives a WAV path)
        #[arg(long, env = "SCAMWATCH_TRANSCRIBER")]
        transcriber: Option<String>,

        /// Frame analyzer command (PPM on stdin, JSON on stdout)
        #[arg(long, env = "SCAMWATCH_FRAME_ANALYZER")]
        frame_analyzer: Option<String>,
    },

    /// Classify a piece of text
    Text {
        text: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Transcribe and classify an audio file
    Audio {
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check a video for deepfake faces and scam speech
    Video {
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Frames sampled per video
        #[arg(long)]
        frame_cap: Option<usize>,
    },

    /// List configured analyzers
    Analyzers {
        /// Show failure reasons
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn emit(envelope: &Envelope, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(envelope)?);
    } else {
        output::print_envelope(envelope);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            bind,
            frame_cap,
            transcriber,
            frame_analyzer,
        } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(cap) = frame_cap {
                config.frame_sample_cap = cap;
            }
            if let Some(command) = transcriber {
                config.transcriber = CommandConfig::new(command);
            }
            if let Some(command) = frame_analyzer {
                config.frame_analyzer = CommandConfig::new(command);
            }
            config.validate()?;

            let orchestrator = Orchestrator::from_config(&config);
            let hub = Arc::new(BroadcastHub::new(config.subscriber_queue_capacity));
            info!(
                frame_cap = config.frame_sample_cap,
                queue_capacity = config.subscriber_queue_capacity,
                "starting scamwatch gateway"
            );

            server::serve(&config, AppState::new(orchestrator, hub)).await?;
        }

        Commands::Text { text, format } => {
            let orchestrator = Orchestrator::from_config(&config);
            emit(&orchestrator.analyze_text(text).await, &format)?;
        }

        Commands::Audio { path, format } => {
            let orchestrator = Orchestrator::from_config(&config);
            emit(&orchestrator.analyze_audio(path).await, &format)?;
        }

        Commands::Video {
            path,
            format,
            frame_cap,
        } => {
            if let Some(cap) = frame_cap {
                config.frame_sample_cap = cap;
                config.validate()?;
            }
            let orchestrator = Orchestrator::from_config(&config);
            emit(&orchestrator.analyze_video(path).await, &format)?;
        }

        Commands::Analyzers { verbose } => {
            let orchestrator = Orchestrator::from_config(&config);
            output::print_availability(&orchestrator.availability(), verbose);
        }
    }

    Ok(())
}
