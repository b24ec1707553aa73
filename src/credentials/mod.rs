//! Repository credentials
//!
//! Credentials live in Kubernetes Secrets labelled
//! `kargo.akuity.io/secret-type=repository`, each carrying `url`, and
//! optionally `username` and `password`, data keys.

use crate::error::{PromotionError, PromotionResult};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use kube::api::ListParams;
use serde::{Deserialize, Serialize};

const SECRET_TYPE_LABEL: &str = "kargo.akuity.io/secret-type";
const SECRET_TYPE_REPOSITORY: &str = "repository";

/// Credentials for reading from and writing to a git repository
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepoCredentials {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

/// Lookup of repository credentials
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialsDatabase: Send + Sync {
    /// Credentials for `repo_url`, if any are stored in `namespace`
    async fn get(&self, namespace: &str, repo_url: &str)
    -> PromotionResult<Option<RepoCredentials>>;
}

/// [`CredentialsDatabase`] backed by Kubernetes Secrets
pub struct KubernetesCredentialsDatabase {
    client: kube::Client,
}

impl KubernetesCredentialsDatabase {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialsDatabase for KubernetesCredentialsDatabase {
    async fn get(
        &self,
        namespace: &str,
        repo_url: &str,
    ) -> PromotionResult<Option<RepoCredentials>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let params =
            ListParams::default().labels(&format!("{}={}", SECRET_TYPE_LABEL, SECRET_TYPE_REPOSITORY));
        let secrets = api
            .list(&params)
            .await
            .map_err(|e| PromotionError::Credentials {
                repo_url: repo_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(secrets
            .items
            .iter()
            .find(|s| secret_value(s, "url").as_deref() == Some(repo_url))
            .map(|s| RepoCredentials {
                username: secret_value(s, "username").unwrap_or_default(),
                password: secret_value(s, "password").unwrap_or_default(),
            }))
    }
}

fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|v| String::from_utf8_lossy(&v.0).into_owned())
}
