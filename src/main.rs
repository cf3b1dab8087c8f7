use anomaly_connector::config::resolve_config_path;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "anomaly-connector")]
#[command(about = "Forwards security anomaly events to Log Analytics", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform one poll-and-forward run
    Run {
        /// Fetch and route, but do not deliver or checkpoint
        #[arg(long)]
        dry_run: bool,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anomaly_connector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run { dry_run }) => {
            anomaly_connector::cli::run::run(config_path, dry_run).await?;
        }
        None => {
            anomaly_connector::cli::run::run(config_path, false).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                anomaly_connector::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
