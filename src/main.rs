use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fieldsync::logging::{self, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(version, about = "Debounced auto-save and conflict recovery for CRM field definitions")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// API root. Overrides FIELDSYNC_BASE_URL and fieldsync.toml.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Collection (pipeline) the fields belong to
    #[arg(long, global = true)]
    pub collection: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show how each draft in a JSON file would be treated by auto-save (offline)
    Classify {
        /// JSON array of field drafts
        file: PathBuf,
    },
    /// Save every draft in a JSON file against the configured backend
    Push {
        /// JSON array of field drafts
        file: PathBuf,
    },
    /// List field types offered by the backend
    Types {
        /// Ignore the cache and fetch again
        #[arg(long)]
        refresh: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default fieldsync.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // A missing .env is normal.
    let _ = dotenvy::from_path(project_dir.join(".env"));
    logging::init(cli.verbose, LogFormat::from_flag(cli.log_json));

    match &cli.command {
        Commands::Classify { file } => cmd::cmd_classify(file)?,
        Commands::Push { file } => cmd::cmd_push(&project_dir, &cli, file).await?,
        Commands::Types { refresh } => cmd::cmd_types(&project_dir, &cli, *refresh).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, &cli, command.clone())?,
    }

    Ok(())
}
