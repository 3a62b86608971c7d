//! Binary entry point for visualky.
//!
//! This binary provides the CLI interface for the vision cascade and the
//! object identification pipeline.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use visualky::VisionConfig;
use visualky::cli::{cmd_analyze, cmd_gate, cmd_identify, cmd_status, cmd_voice, write_json};
use visualky::observability::{self, LogFormat};

/// Visualky - Multi-engine vision for assistive camera apps.
#[derive(Parser)]
#[command(name = "visualky")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Describe an image through the engine cascade.
    Analyze {
        /// Image file (JPEG, PNG or WebP).
        image: PathBuf,

        /// Task mode: scan, shopping, surroundings, learning, conversation, standby.
        #[arg(short, long, default_value = "standby")]
        mode: String,

        /// Free-text hint, such as the product being looked for.
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Identify verified objects in an image.
    Identify {
        /// Image file (JPEG, PNG or WebP).
        image: PathBuf,

        /// Object the user is looking for.
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Classify a voice command.
    Voice {
        /// Transcribed speech.
        transcript: String,

        /// Mode the user is currently in.
        #[arg(short, long, default_value = "standby")]
        mode: String,
    },

    /// Rate evidence for a target with the safety gate.
    Gate {
        /// Object the user asked about.
        target: String,

        /// Observed confidence in [0, 1].
        confidence: f32,

        /// Label that was actually observed.
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Show engine availability.
    Status,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let mut logging = config.logging.clone().with_verbose(cli.verbose);
    if cli.json_logs {
        logging.format = LogFormat::Json;
    }
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command and writes its JSON output to stdout.
async fn run_command(command: Commands, config: &VisionConfig) -> visualky::Result<()> {
    let mut out = io::stdout().lock();
    match command {
        Commands::Analyze { image, mode, query } => {
            let result = cmd_analyze(config, &image, &mode, query.as_deref()).await?;
            write_json(&mut out, &result)
        },
        Commands::Identify { image, target } => {
            let output = cmd_identify(config, &image, target.as_deref()).await?;
            write_json(&mut out, &output)
        },
        Commands::Voice { transcript, mode } => {
            let response = cmd_voice(config, &transcript, &mode).await?;
            write_json(&mut out, &response)
        },
        Commands::Gate {
            target,
            confidence,
            label,
        } => {
            let result = cmd_gate(config, &target, confidence, label.as_deref())?;
            write_json(&mut out, &result)
        },
        Commands::Status => {
            let report = cmd_status(config).await?;
            write_json(&mut out, &report)
        },
    }
}

/// Loads configuration from a path, `VISUALKY_CONFIG_PATH`, or the default location.
fn load_config(path: Option<&Path>) -> visualky::Result<VisionConfig> {
    if let Some(config_path) = path {
        return VisionConfig::load_from_file(config_path);
    }

    if let Ok(config_path) = std::env::var("VISUALKY_CONFIG_PATH") {
        if !config_path.trim().is_empty() {
            return VisionConfig::load_from_file(Path::new(&config_path));
        }
    }

    Ok(VisionConfig::load_default())
}
