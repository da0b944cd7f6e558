use clap::{Parser, Subcommand};
use logship::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logship")]
#[command(about = "Forward agent session JSONL logs to a collector", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll and forward until interrupted (default)
    Run,
    /// Run a single cycle and exit
    Once,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate a default config file
    Init {
        #[arg(long)]
        stdout: bool,
    },
    /// Validate and print the effective config
    Check,
}

#[derive(Subcommand)]
enum CursorAction {
    /// Print committed offsets
    Show {
        /// Read this cursor file instead of the configured one
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logship=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config_path = config_path.as_deref();

    match cli.command {
        Some(Commands::Run) | None => {
            logship::cli::run::run(config_path).await?;
        }
        Some(Commands::Once) => {
            logship::cli::run::run_once(config_path).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                logship::cli::config::init(stdout)?;
            }
            ConfigAction::Check => {
                logship::cli::config::check(config_path)?;
            }
        },
        Some(Commands::Cursor { action }) => match action {
            CursorAction::Show { file } => {
                logship::cli::cursor::show(config_path, file).await?;
            }
        },
    }

    Ok(())
}
