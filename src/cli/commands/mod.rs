//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod extract;
mod harden;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use medocr::config::Config;

#[derive(Parser)]
#[command(name = "medocr")]
#[command(about = "OCR decision pipeline for scanned legal-medical PDFs")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text from a PDF, running enhanced OCR when needed
    Extract {
        /// PDF file to process
        file: PathBuf,
        /// Always run the enhanced OCR pass
        #[arg(long)]
        force_enhanced: bool,
        /// Output the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the strategy decision for a PDF without calling OCR
    Select {
        /// PDF file to inspect
        file: PathBuf,
        /// Report the decision as if enhanced OCR were forced
        #[arg(long)]
        force_enhanced: bool,
    },

    /// Clean up a stored OCR line map (one line per line)
    Harden {
        /// Text file holding the line map
        file: PathBuf,
        /// OCR score of the stored extraction
        #[arg(long)]
        score: Option<f64>,
        /// Review flag codes raised downstream (repeatable)
        #[arg(long = "flag")]
        flags: Vec<String>,
        /// Harden even when no trigger condition holds
        #[arg(long)]
        force: bool,
    },

    /// Show OCR service and renderer availability
    Check,
}

/// Load config from an explicit path, or fall back to discovery.
async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from_path(path)
                .await
                .map_err(|e| anyhow::anyhow!(e))
        }
        None => Ok(Config::load().await),
    }
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).await?;

    if let Some(path) = &config.source_path {
        tracing::debug!("Using config from {}", path.display());
    }

    match cli.command {
        Commands::Extract {
            file,
            force_enhanced,
            json,
        } => extract::cmd_extract(&config, &file, force_enhanced, json).await,
        Commands::Select {
            file,
            force_enhanced,
        } => extract::cmd_select(&file, force_enhanced).await,
        Commands::Harden {
            file,
            score,
            flags,
            force,
        } => harden::cmd_harden(&file, score, &flags, force).await,
        Commands::Check => check::cmd_check(&config).await,
    }
}
