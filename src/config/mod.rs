//! Configuration system for kargo-promoter
//!
//! Built-in defaults, overlaid by a YAML config file, overlaid by
//! `KARGO_PROMOTER_*` environment variables.

pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{ArgoCDConfig, BookkeeperConfig, Config, CredentialsConfig, LoggerConfig};

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    match key {
        "argocd.defaultNamespace" => Ok(config.argocd.default_namespace.clone()),
        "argocd.syncInitiator" => Ok(config.argocd.sync_initiator.clone()),
        "bookkeeper.address" => Ok(config.bookkeeper.address.clone().unwrap_or_default()),
        "bookkeeper.timeoutSeconds" => Ok(config.bookkeeper.timeout_seconds.to_string()),
        "credentials.namespace" => Ok(config.credentials.namespace.clone()),
        "logger.level" => Ok(config.logger.level.clone()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}
