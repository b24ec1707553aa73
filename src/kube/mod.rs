//! Kubernetes client construction
//!
//! Uses the default kubeconfig loading strategy (in-cluster config, then
//! `KUBECONFIG`, then `~/.kube/config`) unless a context is named, in which
//! case that context is loaded from the kubeconfig file.

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// Build a Kubernetes client, optionally for a named kubeconfig context
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = match context {
        Some(name) => {
            let options = KubeConfigOptions {
                context: Some(name.to_string()),
                ..Default::default()
            };
            Config::from_kubeconfig(&options)
                .await
                .with_context(|| format!("Failed to load kubeconfig context: {}", name))?
        }
        None => {
            if let Some(name) = current_context() {
                tracing::debug!(context = name.as_str(), "Using current kubeconfig context");
            }
            Config::infer()
                .await
                .context("Failed to infer Kubernetes configuration")?
        }
    };

    tracing::debug!(
        cluster = %config.cluster_url,
        namespace = config.default_namespace.as_str(),
        "Connecting to Kubernetes"
    );

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Name of the kubeconfig's current context, if a kubeconfig is present
fn current_context() -> Option<String> {
    let kubeconfig = Kubeconfig::read().ok()?;
    current_context_of(&kubeconfig)
}

fn current_context_of(kubeconfig: &Kubeconfig) -> Option<String> {
    kubeconfig
        .current_context
        .clone()
        .filter(|name| !name.is_empty())
}
