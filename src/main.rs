//! kargo-promoter - promote Freight into Stages through Argo CD
//!
//! Runs one promotion or one health assessment against the current cluster.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kargo_promoter::cli::{self, ConfigSubcommand};
use kargo_promoter::config::ConfigLoader;
use std::path::PathBuf;

/// Promote Freight into Stages through Argo CD
#[derive(Parser, Debug)]
#[command(name = "kargo-promoter")]
#[command(about = "Promote Freight into Stages through Argo CD", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Promote Freight into a Stage and print the resulting Freight
    Promote {
        /// Stage manifest (YAML)
        #[arg(long)]
        stage: PathBuf,
        /// Freight document (YAML)
        #[arg(long)]
        freight: PathBuf,
    },
    /// Assess the health of a Stage running the given Freight
    Health {
        /// Stage manifest (YAML)
        #[arg(long)]
        stage: PathBuf,
        /// Freight document (YAML)
        #[arg(long)]
        freight: PathBuf,
    },
    /// Display version information
    Version,
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Version => {
            cli::display_version();
            Ok(())
        }
        Command::Config { subcommand } => cli::handle_config_command(subcommand),
        Command::Promote { stage, freight } => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            cli::init_logging(args.debug, &config.logger.level, args.log_file.as_deref())?;
            cli::handle_promote(&config, &stage, &freight, args.context.as_deref()).await
        }
        Command::Health { stage, freight } => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            cli::init_logging(args.debug, &config.logger.level, args.log_file.as_deref())?;
            cli::handle_health(&config, &stage, &freight, args.context.as_deref()).await
        }
    }
}
