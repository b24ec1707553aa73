//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use crate::models::stage::DEFAULT_ARGOCD_NAMESPACE;
use crate::promotion::{DEFAULT_SYNC_INITIATOR, EngineSettings};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Argo CD settings
    #[serde(default)]
    pub argocd: ArgoCDConfig,

    /// Bookkeeper server settings
    #[serde(default)]
    pub bookkeeper: BookkeeperConfig,

    /// Repository credentials settings
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Logger configuration
    #[serde(default)]
    pub logger: LoggerConfig,
}

/// Argo CD configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDConfig {
    /// Namespace used when an update names no Application namespace
    #[serde(default = "default_argocd_namespace")]
    pub default_namespace: String,

    /// Username recorded on sync operations
    #[serde(default = "default_sync_initiator")]
    pub sync_initiator: String,
}

/// Bookkeeper configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookkeeperConfig {
    /// http(s) URL of the Bookkeeper server
    #[serde(default)]
    pub address: Option<String>,

    /// Render request timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Credentials configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsConfig {
    /// Namespace holding repository Secrets
    #[serde(default = "default_credentials_namespace")]
    pub namespace: String,
}

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggerConfig {
    /// Default log level, used unless `RUST_LOG` is set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Config {
    /// Settings handed to the promotion engine
    pub fn to_engine_settings(&self) -> EngineSettings {
        EngineSettings {
            argocd_namespace: self.argocd.default_namespace.clone(),
            sync_initiator: self.argocd.sync_initiator.clone(),
            credentials_namespace: self.credentials.namespace.clone(),
        }
    }
}

impl BookkeeperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// Default value functions
fn default_argocd_namespace() -> String {
    DEFAULT_ARGOCD_NAMESPACE.to_string()
}

fn default_sync_initiator() -> String {
    DEFAULT_SYNC_INITIATOR.to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_credentials_namespace() -> String {
    "kargo".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ArgoCDConfig {
    fn default() -> Self {
        Self {
            default_namespace: default_argocd_namespace(),
            sync_initiator: default_sync_initiator(),
        }
    }
}

impl Default for BookkeeperConfig {
    fn default() -> Self {
        Self {
            address: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            namespace: default_credentials_namespace(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
