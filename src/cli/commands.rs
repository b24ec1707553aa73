//! CLI command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;
use std::sync::Arc;

use crate::argocd::KubeApplicationStore;
use crate::bookkeeper::{HttpRenderer, Renderer, UnconfiguredRenderer};
use crate::config::{Config, ConfigLoader, paths};
use crate::credentials::KubernetesCredentialsDatabase;
use crate::health::HealthChecker;
use crate::models::{Freight, Stage};
use crate::promotion::{Mechanism, new_mechanisms};

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "argocd.defaultNamespace", "logger.level")
        key: Option<String>,
    },
    /// List all configuration
    List,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: ConfigSubcommand) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key } => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;

            if let Some(key) = key {
                let value = crate::config::get_config_value(&config, &key)?;
                println!("{}", value);
            } else {
                print_yaml(&config)?;
            }
        }
        ConfigSubcommand::List => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            print_yaml(&config)?;
        }
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
        }
        ConfigSubcommand::Validate => match ConfigLoader::validate() {
            Ok(_) => {
                println!("Configuration is valid");
            }
            Err(e) => {
                eprintln!("Configuration validation failed: {:#}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

/// Promote Freight into a Stage once and print the resulting Freight
pub async fn handle_promote(
    config: &Config,
    stage_path: &Path,
    freight_path: &Path,
    context: Option<&str>,
) -> Result<()> {
    let stage = read_stage(stage_path)?;
    let freight = read_freight(freight_path)?;

    let client = crate::kube::create_client(context).await?;
    let renderer: Arc<dyn Renderer> = match &config.bookkeeper.address {
        Some(address) => Arc::new(HttpRenderer::new(address, config.bookkeeper.timeout())?),
        None => Arc::new(UnconfiguredRenderer),
    };
    let mechanisms = new_mechanisms(
        Arc::new(KubeApplicationStore::new(client.clone())),
        renderer,
        Arc::new(KubernetesCredentialsDatabase::new(client)),
        config.to_engine_settings(),
    );

    tracing::info!(
        stage = stage_name(&stage),
        freight = freight.id.as_str(),
        "promoting Freight"
    );

    match mechanisms.promote(&stage, freight).await {
        Ok(freight) => {
            tracing::info!(stage = stage_name(&stage), "promotion succeeded");
            print_yaml(&freight)
        }
        Err(err) => {
            if err.source.is_authorization() {
                tracing::warn!(stage = stage_name(&stage), "promotion not authorized");
            }
            // Partial progress is still worth showing
            print_yaml(&err.freight)?;
            Err(anyhow::Error::new(err)).context("Promotion failed")
        }
    }
}

/// Assess the health of a Stage running the given Freight and print it
pub async fn handle_health(
    config: &Config,
    stage_path: &Path,
    freight_path: &Path,
    context: Option<&str>,
) -> Result<()> {
    let stage = read_stage(stage_path)?;
    let freight = read_freight(freight_path)?;

    let client = crate::kube::create_client(context).await?;
    let checker = HealthChecker::new(
        Arc::new(KubeApplicationStore::new(client)),
        &config.to_engine_settings(),
    );

    let health = checker
        .check_health(&freight, &stage.spec.promotion_mechanisms.argocd_app_updates)
        .await;
    print_yaml(&health)
}

/// Read a Stage manifest
pub fn read_stage(path: &Path) -> Result<Stage> {
    read_yaml(path, "Stage")
}

/// Read a Freight document
pub fn read_freight(path: &Path) -> Result<Freight> {
    read_yaml(path, "Freight")
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file: {}", what, path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse {} file: {}", what, path.display()))
}

fn print_yaml<T: serde::Serialize>(value: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(value).context("Failed to serialize output")?;
    print!("{}", yaml);
    Ok(())
}

fn stage_name(stage: &Stage) -> &str {
    stage.metadata.name.as_deref().unwrap_or_default()
}
