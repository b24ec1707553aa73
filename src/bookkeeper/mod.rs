//! Bookkeeper client
//!
//! Bookkeeper renders environment-specific configuration from the default
//! branch of a GitOps repository into plain YAML in an environment-specific
//! branch. This module holds its request/response wire types and the
//! [`Renderer`] seam used by the git-rendering promotion mechanism.

use crate::credentials::RepoCredentials;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const RENDER_PATH: &str = "v1alpha1/render";

/// A request to render configuration for one environment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    #[serde(rename = "repoURL", default, skip_serializing_if = "String::is_empty")]
    pub repo_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_creds: Option<RepoCredentials>,

    /// Commit to render from; the head of the default branch when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit: String,

    /// Environment-specific branch to render into
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_branch: String,

    /// Images (`<repo>:<tag>`) to incorporate into the rendered configuration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Open a PR against the target branch instead of committing to it
    #[serde(default, skip_serializing_if = "std::ops::Not::not", rename = "openPR")]
    pub open_pr: bool,
}

/// Outcome of a successful render
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    /// Commit to the target branch holding the rendered configuration.
    /// Only set when no PR was requested.
    #[serde(rename = "commitID", default, skip_serializing_if = "String::is_empty")]
    pub commit_id: String,

    /// PR containing the rendered configuration. Only set when a PR was
    /// requested.
    #[serde(rename = "pullRequestURL", default, skip_serializing_if = "String::is_empty")]
    pub pull_request_url: String,
}

/// Renders configuration through Bookkeeper
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> Result<RenderResponse>;
}

/// [`Renderer`] talking to a Bookkeeper server over HTTP
pub struct HttpRenderer {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl HttpRenderer {
    /// Create a renderer for the Bookkeeper server at `address`
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        let endpoint = render_endpoint(address)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        tracing::debug!("Created Bookkeeper renderer for: {}", endpoint);

        Ok(Self { client, endpoint })
    }
}

/// Resolve the render endpoint of the Bookkeeper server at `address`
pub fn render_endpoint(address: &str) -> Result<url::Url> {
    let mut base = url::Url::parse(address)
        .with_context(|| format!("Invalid Bookkeeper address: {}", address))?;
    if !matches!(base.scheme(), "http" | "https") {
        anyhow::bail!("Bookkeeper address must be http(s): {}", address);
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(RENDER_PATH)
        .with_context(|| format!("Invalid Bookkeeper address: {}", address))
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderResponse> {
        tracing::debug!(
            "Requesting render of {} into branch {}",
            request.repo_url,
            request.target_branch
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send render request to {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Bookkeeper returned {}: {}", status, body.trim());
        }

        response
            .json::<RenderResponse>()
            .await
            .context("Failed to decode Bookkeeper response")
    }
}

/// [`Renderer`] used when no Bookkeeper server is configured
///
/// Every render fails, so Stages that ask for Bookkeeper rendering fail
/// loudly instead of silently skipping it.
pub struct UnconfiguredRenderer;

#[async_trait]
impl Renderer for UnconfiguredRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderResponse> {
        anyhow::bail!(
            "no Bookkeeper address configured; cannot render {}",
            request.repo_url
        )
    }
}
