//! Scholar command-line interface.
//!
//! Usage:
//!   scholar ask "Quanto é 10 * 10?"
//!   scholar chat
//!   scholar assistants
//!   scholar conversations
//!   scholar runs list
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY` - hosted service key (required)
//! - `SCHOLAR_CONFIG` - path to the TOML configuration file
//! - `RUST_LOG` - log filter (default: info,scholar=debug)
//! - `SCHOLAR_LOG_DIR` - directory for the daily log file (default: logs)

use anyhow::Result;
use clap::{Parser, Subcommand};
use scholar_common::ScholarError;
use scholar_coordinator::{ApiCredential, ScholarConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Context;

/// Config file picked up from the working directory when none is given.
const DEFAULT_CONFIG_FILE: &str = "scholar.toml";

#[derive(Parser)]
#[command(name = "scholar")]
#[command(about = "Routes student questions to specialist assistants", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, env = "SCHOLAR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the daily log file
    #[arg(long, global = true, env = "SCHOLAR_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question with the agent flow
    Ask {
        /// The question to ask
        question: String,
    },
    /// Interactive agent flow with stored conversations
    Chat,
    /// Interactive assistants flow over the configured thread
    Assistants,
    /// List stored conversations
    Conversations,
    /// Inspect and clean up runs on the configured thread
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },
}

#[derive(Subcommand)]
enum RunsAction {
    /// Show runs that block the thread
    List,
    /// Cancel every run that blocks the thread
    CancelActive,
    /// Show a run's status and the specialist it asks for
    Inspect {
        run_id: String,
    },
    /// Create a new thread and print its id
    NewThread,
}

/// Daily-rotated `scholar.YYYY-MM-DD.log` under `dir`.
fn log_file_appender(dir: &Path) -> std::result::Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("scholar")
        .filename_suffix("log")
        .build(dir)
}

/// Console on stderr plus the daily file. The guard flushes the file on drop.
fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let (file_layer, guard, file_error) = match log_file_appender(log_dir) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scholar=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!(
            dir = %log_dir.display(),
            error = %e,
            "Could not open the log file, logging to the console only"
        );
    }
    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.log_dir);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Scholar exited with an error");
            match err.downcast_ref::<ScholarError>() {
                Some(scholar) => eprintln!("{}", scholar.user_message()),
                None => eprintln!("Erro: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    // The key is checked before any entry point does work.
    let credential = ApiCredential::resolve(&config.api)?;
    println!("Chave da API configurada: {}", credential.masked());

    let shutdown = CancellationToken::new();
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, shutting down");
                token.cancel();
            }
        });
    }

    let ctx = Context::new(config, credential, shutdown);

    match cli.command {
        Commands::Ask { question } => commands::chat::ask(&ctx, &question).await,
        Commands::Chat => commands::chat::chat(&ctx).await,
        Commands::Assistants => commands::assistants::repl(&ctx).await,
        Commands::Conversations => commands::conversations::list(&ctx).await,
        Commands::Runs { action } => match action {
            RunsAction::List => commands::runs::list(&ctx).await,
            RunsAction::CancelActive => commands::runs::cancel_active(&ctx).await,
            RunsAction::Inspect { run_id } => commands::runs::inspect(&ctx, &run_id).await,
            RunsAction::NewThread => commands::runs::new_thread(&ctx).await,
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<ScholarConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            ScholarConfig::from_file(path)
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            tracing::info!(path = DEFAULT_CONFIG_FILE, "Loading configuration");
            ScholarConfig::from_file(DEFAULT_CONFIG_FILE)
        }
        None => {
            tracing::info!("Using default configuration");
            Ok(ScholarConfig::default())
        }
    }
}
