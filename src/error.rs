//! Promotion engine errors

use crate::models::Freight;
use thiserror::Error;

/// Errors surfaced by promotion mechanisms and their collaborators
#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("unable to find Argo CD Application {name:?} in namespace {namespace:?}")]
    AppNotFound { name: String, namespace: String },

    #[error("error finding Argo CD Application {name:?} in namespace {namespace:?}: {source}")]
    AppLookup {
        name: String,
        namespace: String,
        #[source]
        source: Box<PromotionError>,
    },

    #[error(
        "Argo CD Application {app:?} in namespace {app_namespace:?} does not permit mutation by \
         Kargo Stage {stage} in namespace {stage_namespace}"
    )]
    Unauthorized {
        app: String,
        app_namespace: String,
        stage: String,
        stage_namespace: String,
    },

    #[error(
        "Argo CD Application {app:?} in namespace {app_namespace:?} has a malformed \
         authorization annotation: {reason}"
    )]
    MalformedAuthorization {
        app: String,
        app_namespace: String,
        reason: String,
    },

    #[error("error updating source(s) of Argo CD Application {name:?} in namespace {namespace:?}: {reason}")]
    SourceUpdate {
        name: String,
        namespace: String,
        reason: String,
    },

    #[error("error patching Argo CD Application {name:?}: {source}")]
    Patch {
        name: String,
        #[source]
        source: Box<PromotionError>,
    },

    #[error("error rendering configuration for git repo {repo_url:?}: {reason}")]
    Render { repo_url: String, reason: String },

    #[error("error obtaining credentials for git repo {repo_url:?}: {reason}")]
    Credentials { repo_url: String, reason: String },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PromotionError {
    /// Whether this error means the Stage is not allowed to touch the
    /// Application, whether outright or because the grant could not be read
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            PromotionError::Unauthorized { .. } | PromotionError::MalformedAuthorization { .. }
        )
    }

    /// Whether this error means an Application does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, PromotionError::AppNotFound { .. })
    }
}

/// Result type for promotion operations
pub type PromotionResult<T> = Result<T, PromotionError>;

/// A failed promotion, together with the Freight as it stood when the
/// failure happened
#[derive(Debug, Error)]
#[error("{mechanism} failed: {source}")]
pub struct PromoteError {
    /// Name of the mechanism that failed
    pub mechanism: String,
    /// Freight accumulated up to the failure
    pub freight: Freight,
    #[source]
    pub source: PromotionError,
}

/// Result type for [`crate::promotion::Mechanism::promote`]
pub type PromoteResult = Result<Freight, PromoteError>;
