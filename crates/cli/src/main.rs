use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use idcard_ocr::{OcrConfig, OcrOrchestrator};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(
    name = "idcard-ocr",
    about = "Extract identity-card fields by reconciling several OCR engines",
    disable_help_subcommand = true
)]
struct Cli {
    /// Override the configuration file path
    #[arg(long = "config", global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every engine over an image and print the JSON report
    Scan {
        image: PathBuf,
        /// Run only this engine (e.g. `tesseract`, `easy_ocr`); no best guess
        #[arg(short = 'e', long = "engine")]
        engine: Option<String>,
        #[arg(long)]
        pretty: bool,
    },
    /// List registered engines and whether each can recognize text
    Engines,
    /// Process every image dropped into a folder
    Watch {
        dir: PathBuf,
        /// Where reports are written (defaults to the watched folder)
        #[arg(long = "out", value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Run only the field extractor over a text file
    Extract {
        text_file: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let orchestrator = OcrOrchestrator::from_config(&config);

    match cli.command {
        Command::Scan { image, engine, pretty } => {
            commands::scan(&orchestrator, &image, engine.as_deref(), pretty).await
        }
        Command::Engines => commands::engines(&orchestrator),
        Command::Watch { dir, out } => {
            let out = out.unwrap_or_else(|| dir.clone());
            commands::watch(&orchestrator, &dir, &out).await
        }
        Command::Extract { text_file, pretty } => commands::extract(&text_file, pretty),
    }
}

/// An explicit `--config` must exist; the per-user default may be absent.
fn load_config(explicit: Option<&Path>) -> Result<OcrConfig> {
    if let Some(path) = explicit {
        return OcrConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    let Some(dirs) = directories::ProjectDirs::from("com", "idcard-ocr", "IdCardOcr") else {
        return Ok(OcrConfig::default());
    };
    let path = dirs.config_dir().join("config.toml");
    tracing::debug!("Using config {}", path.display());
    OcrConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}
