//! Promotion mechanisms
//!
//! A [`Mechanism`] is one unit of promotion work for a Stage. Mechanisms are
//! composed with [`CompositeMechanism`], which runs them in order and stops at
//! the first failure.
//!
//! ## Adding a New Mechanism
//!
//! 1. Implement [`Mechanism`]. Return the incoming Freight unchanged when the
//!    Stage has nothing configured for the mechanism.
//! 2. Add it to the list built in [`new_mechanisms`], in the position it
//!    should run.

mod argocd;
mod composite;
mod git;

pub use argocd::{
    AUTHORIZED_STAGE_ANNOTATION_KEY, ApplySourceUpdateFn, ArgoCDMechanism,
    apply_argocd_source_update, authorize_argocd_app_update, build_app_patch, request_sync,
};
pub use composite::CompositeMechanism;
pub use git::BookkeeperMechanism;

use crate::argocd::ApplicationStore;
use crate::bookkeeper::Renderer;
use crate::credentials::CredentialsDatabase;
use crate::error::PromoteResult;
use crate::models::{Freight, Stage};
use crate::models::stage::DEFAULT_ARGOCD_NAMESPACE;
use async_trait::async_trait;
use std::sync::Arc;

/// Username recorded on sync operations this engine starts
pub const DEFAULT_SYNC_INITIATOR: &str = "kargo-controller";

/// A unit of promotion work
#[async_trait]
pub trait Mechanism: Send + Sync {
    /// Human-readable name of this mechanism
    fn name(&self) -> &str;

    /// Promote `freight` into `stage`
    ///
    /// Returns the Freight, possibly amended. On failure the error carries
    /// the Freight as it stood when the failure happened.
    async fn promote(&self, stage: &Stage, freight: Freight) -> PromoteResult;
}

/// Settings shared by the engine's mechanisms and health checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Namespace Applications are looked up in when an update names none
    pub argocd_namespace: String,
    /// Username recorded on sync operations
    pub sync_initiator: String,
    /// Namespace repository credentials are read from
    pub credentials_namespace: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            argocd_namespace: DEFAULT_ARGOCD_NAMESPACE.to_string(),
            sync_initiator: DEFAULT_SYNC_INITIATOR.to_string(),
            credentials_namespace: "kargo".to_string(),
        }
    }
}

/// Build the full set of promotion mechanisms
///
/// Rendering runs before Argo CD updates so that the Argo CD update (and any
/// later health check) sees the rendered commit.
pub fn new_mechanisms(
    store: Arc<dyn ApplicationStore>,
    renderer: Arc<dyn Renderer>,
    credentials: Arc<dyn CredentialsDatabase>,
    settings: EngineSettings,
) -> CompositeMechanism {
    CompositeMechanism::new(
        "promotion mechanisms",
        vec![
            Box::new(BookkeeperMechanism::new(
                renderer,
                credentials,
                settings.credentials_namespace.clone(),
            )),
            Box::new(ArgoCDMechanism::new(store, settings)),
        ],
    )
}
