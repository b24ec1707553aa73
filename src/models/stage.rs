//! Stage model
//!
//! Only the parts of the Stage resource the promotion engine reads are
//! modelled here: its metadata and its promotion mechanism configuration.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Namespace Argo CD Applications are looked up in when an update does not
/// name one
pub const DEFAULT_ARGOCD_NAMESPACE: &str = "argocd";

/// A deployment target that Freight is promoted into
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "kargo.akuity.io",
    version = "v1alpha1",
    kind = "Stage",
    plural = "stages",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct StageSpec {
    /// How Freight gets promoted into this Stage
    #[serde(default)]
    pub promotion_mechanisms: PromotionMechanisms,
}

/// Ordered promotion mechanism configuration for a Stage
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromotionMechanisms {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub git_repo_updates: Vec<GitRepoUpdate>,

    #[serde(default, rename = "argoCDAppUpdates", skip_serializing_if = "Vec::is_empty")]
    pub argocd_app_updates: Vec<ArgoCDAppUpdate>,
}

/// Rendering of environment-specific configuration into a git branch
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitRepoUpdate {
    #[serde(rename = "repoURL")]
    pub repo_url: String,

    /// Branch rendered manifests are written to
    #[serde(default)]
    pub write_branch: String,

    /// Render through Bookkeeper
    #[serde(default)]
    pub bookkeeper: bool,
}

/// An Argo CD Application to update (and later health check) on promotion
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDAppUpdate {
    pub app_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app_namespace: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_updates: Vec<ArgoCDSourceUpdate>,
}

impl ArgoCDAppUpdate {
    /// The Application's namespace, falling back to `default`
    pub fn app_namespace_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.app_namespace.is_empty() {
            default
        } else {
            &self.app_namespace
        }
    }
}

/// Changes to make to any Application source pointing at `(repo_url, chart)`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSourceUpdate {
    #[serde(rename = "repoURL")]
    pub repo_url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chart: String,

    #[serde(default)]
    pub update_target_revision: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kustomize: Option<ArgoCDKustomize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm: Option<ArgoCDHelm>,
}

/// Images to pin through Kustomize image overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDKustomize {
    #[serde(default)]
    pub images: Vec<String>,
}

/// Images to pin through Helm parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDHelm {
    #[serde(default)]
    pub images: Vec<ArgoCDHelmImageUpdate>,
}

/// Writes an image reference or tag into the Helm parameter `key`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDHelmImageUpdate {
    pub image: String,

    pub key: String,

    pub value: ImageUpdateValueType,
}

/// What to write into a Helm parameter for an image
///
/// Unrecognised values deserialize to `Unknown` and are skipped when
/// building parameter changes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageUpdateValueType {
    /// `<image>:<tag>`
    Image,
    /// `<tag>`
    Tag,
    #[default]
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_namespace_falls_back_to_default() {
        let update = ArgoCDAppUpdate {
            app_name: "guestbook".to_string(),
            ..Default::default()
        };
        assert_eq!(update.app_namespace_or(DEFAULT_ARGOCD_NAMESPACE), "argocd");

        let update = ArgoCDAppUpdate {
            app_name: "guestbook".to_string(),
            app_namespace: "apps".to_string(),
            ..Default::default()
        };
        assert_eq!(update.app_namespace_or(DEFAULT_ARGOCD_NAMESPACE), "apps");
    }

    #[test]
    fn test_stage_deserialization() {
        let yaml = r#"
apiVersion: kargo.akuity.io/v1alpha1
kind: Stage
metadata:
  name: test
  namespace: kargo-demo
spec:
  promotionMechanisms:
    argoCDAppUpdates:
      - appName: kargo-demo-test
        sourceUpdates:
          - repoURL: https://github.com/example/kargo-demo.git
            updateTargetRevision: true
            helm:
              images:
                - image: nginx
                  key: image.tag
                  value: Tag
                - image: nginx
                  key: image.ref
                  value: Digest
"#;
        let stage: Stage = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(stage.metadata.namespace.as_deref(), Some("kargo-demo"));
        let updates = &stage.spec.promotion_mechanisms.argocd_app_updates;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].app_namespace_or("gitops"), "gitops");
        let helm = updates[0].source_updates[0].helm.as_ref().unwrap();
        assert_eq!(helm.images[0].value, ImageUpdateValueType::Tag);
        assert_eq!(helm.images[1].value, ImageUpdateValueType::Unknown);
        assert!(stage.spec.promotion_mechanisms.git_repo_updates.is_empty());
    }
}
