//! Configuration loading and merging logic
//!
//! Handles loading configuration from multiple sources and merging them
//! according to precedence rules.

use super::{paths, schema::Config};
use anyhow::{Context, Result};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Root config file
    /// 3. Built-in defaults
    pub fn load() -> Result<Config> {
        Self::load_from(&paths::root_config_path())
    }

    /// Load configuration using `path` as the config file
    pub fn load_from(path: &Path) -> Result<Config> {
        let mut config = Self::load_defaults();

        if path.exists() {
            config = Self::load_file(path)?;
        }

        Ok(Self::apply_env_overrides(config))
    }

    /// Load configuration from a file
    ///
    /// Keys missing from the file take their default values.
    pub fn load_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // An empty file is a valid, all-defaults config
        if contents.trim().is_empty() {
            return Ok(Self::load_defaults());
        }

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the merged configuration and check its values
    pub fn validate() -> Result<Config> {
        let config = Self::load().context("Failed to load merged configuration")?;
        Self::check(&config)?;
        Ok(config)
    }

    /// Check configuration values for consistency
    pub fn check(config: &Config) -> Result<()> {
        if config.argocd.default_namespace.trim().is_empty() {
            return Err(anyhow::anyhow!("argocd.defaultNamespace must not be empty"));
        }

        if let Some(address) = &config.bookkeeper.address {
            let url = url::Url::parse(address)
                .with_context(|| format!("bookkeeper.address is not a valid URL: {}", address))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(anyhow::anyhow!(
                    "bookkeeper.address must use http or https, got {}",
                    url.scheme()
                ));
            }
        }

        if config.bookkeeper.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("bookkeeper.timeoutSeconds must be positive"));
        }

        Ok(())
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        Config::default()
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(config: Config) -> Config {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    fn apply_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
        if let Some(namespace) = lookup("KARGO_PROMOTER_ARGOCD_NAMESPACE") {
            config.argocd.default_namespace = namespace;
        }

        if let Some(initiator) = lookup("KARGO_PROMOTER_SYNC_INITIATOR") {
            config.argocd.sync_initiator = initiator;
        }

        if let Some(address) = lookup("KARGO_PROMOTER_BOOKKEEPER_ADDRESS") {
            config.bookkeeper.address = Some(address).filter(|a| !a.is_empty());
        }

        if let Some(namespace) = lookup("KARGO_PROMOTER_CREDENTIALS_NAMESPACE") {
            config.credentials.namespace = namespace;
        }

        if let Some(level) = lookup("KARGO_PROMOTER_LOG_LEVEL") {
            config.logger.level = level;
        }

        config
    }
}
