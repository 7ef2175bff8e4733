//! vinsure CLI: runs the training-data pipeline and its maintenance tasks.

mod commands;

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// vinsure: prepare vehicle insurance data for model training
#[derive(Parser, Debug)]
#[command(name = "vinsure", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run ingestion, validation and transformation end to end
    Run,
    /// Inspect the dataset schema
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Transform a held-out CSV with a fitted preprocessor
    Apply {
        /// Fitted preprocessor written by a previous run
        #[arg(long)]
        preprocessor: PathBuf,

        /// Raw CSV with the same columns as the ingested splits
        #[arg(long)]
        input: PathBuf,

        /// Destination `.npy` file
        #[arg(long)]
        output: PathBuf,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum SchemaAction {
    /// Load and validate a schema file (defaults to the configured one)
    Check {
        path: Option<PathBuf>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default vinsure.toml into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let workspace = commands::resolve_workspace(&cli.workspace)?;

    // A broken config must not stop logging; commands report the error.
    let log_dir = commands::load_pipeline_config(&workspace, cli.config.as_deref())
        .ok()
        .and_then(|c| c.logging.log_dir);
    let _guard = init_tracing(cli.verbose, cli.quiet, log_dir.as_deref());

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}

/// Human-readable stderr output plus daily-rolling JSON files.
fn init_tracing(
    verbose: u8,
    quiet: bool,
    log_dir: Option<&Path>,
) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = log_dir.map(Path::to_path_buf).unwrap_or_else(|| {
        directories::ProjectDirs::from("dev", "vinsure", "vinsure")
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    });
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "vinsure.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    guard
}
