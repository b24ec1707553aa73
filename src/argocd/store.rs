//! Access to Argo CD Application resources
//!
//! The promotion engine never talks to the Kubernetes API directly. It goes
//! through [`ApplicationStore`] so tests can substitute their own store.

use crate::error::PromotionResult;
use crate::models::Application;
use crate::models::application::{
    APPLICATION_GROUP, APPLICATION_KIND, APPLICATION_PLURAL, APPLICATION_VERSION,
};
use async_trait::async_trait;
use kube::Api;
use kube::api::{Patch, PatchParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};

/// Get and patch Argo CD Applications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Fetch an Application, returning `None` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> PromotionResult<Option<Application>>;

    /// Apply a JSON merge patch to an Application
    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> PromotionResult<()>;
}

/// [`ApplicationStore`] backed by the Kubernetes API
pub struct KubeApplicationStore {
    client: kube::Client,
    api_resource: ApiResource,
}

impl KubeApplicationStore {
    pub fn new(client: kube::Client) -> Self {
        let gvk = GroupVersionKind::gvk(APPLICATION_GROUP, APPLICATION_VERSION, APPLICATION_KIND);
        Self {
            client,
            api_resource: ApiResource::from_gvk_with_plural(&gvk, APPLICATION_PLURAL),
        }
    }

    fn api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.api_resource)
    }
}

#[async_trait]
impl ApplicationStore for KubeApplicationStore {
    async fn get(&self, namespace: &str, name: &str) -> PromotionResult<Option<Application>> {
        tracing::debug!("Fetching Argo CD Application {}/{}", namespace, name);

        let Some(obj) = self.api(namespace).get_opt(name).await? else {
            return Ok(None);
        };
        let app: Application = serde_json::from_value(serde_json::to_value(&obj)?)?;
        Ok(Some(app))
    }

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> PromotionResult<()> {
        tracing::debug!("Patching Argo CD Application {}/{}", namespace, name);

        self.api(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
