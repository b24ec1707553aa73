//! Git-rendering promotion mechanism
//!
//! Renders a Stage's configuration through Bookkeeper and records the
//! resulting commit on the Freight as the commit to health check against.

use super::Mechanism;
use crate::bookkeeper::{RenderRequest, Renderer};
use crate::credentials::CredentialsDatabase;
use crate::error::{PromoteError, PromoteResult, PromotionError, PromotionResult};
use crate::models::{Freight, GitRepoUpdate, Stage};
use async_trait::async_trait;
use std::sync::Arc;

/// [`Mechanism`] that renders configuration through Bookkeeper
pub struct BookkeeperMechanism {
    renderer: Arc<dyn Renderer>,
    credentials: Arc<dyn CredentialsDatabase>,
    credentials_namespace: String,
}

impl BookkeeperMechanism {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        credentials: Arc<dyn CredentialsDatabase>,
        credentials_namespace: String,
    ) -> Self {
        Self {
            renderer,
            credentials,
            credentials_namespace,
        }
    }

    async fn do_single_update(
        &self,
        update: &GitRepoUpdate,
        freight: &mut Freight,
    ) -> PromotionResult<()> {
        let Some(commit) = freight.commit_for(&update.repo_url) else {
            tracing::debug!(
                "Freight has no commit for {}; nothing to render",
                update.repo_url
            );
            return Ok(());
        };

        let repo_creds = self
            .credentials
            .get(&self.credentials_namespace, &update.repo_url)
            .await?;

        let request = RenderRequest {
            repo_url: update.repo_url.clone(),
            repo_creds,
            commit: commit.id.clone(),
            target_branch: update.write_branch.clone(),
            images: freight
                .images
                .iter()
                .map(|i| format!("{}:{}", i.repo_url, i.tag))
                .collect(),
            open_pr: false,
        };

        let response = self
            .renderer
            .render(request)
            .await
            .map_err(|e| PromotionError::Render {
                repo_url: update.repo_url.clone(),
                reason: format!("{:#}", e),
            })?;

        if response.commit_id.is_empty() {
            tracing::info!(
                "Bookkeeper opened {} for {}; no rendered commit to track",
                response.pull_request_url,
                update.repo_url
            );
            return Ok(());
        }

        if let Some(commit) = freight.commit_for_mut(&update.repo_url) {
            commit.health_check_commit = response.commit_id;
        }
        tracing::debug!(repo = update.repo_url.as_str(), "rendered configuration");
        Ok(())
    }
}

#[async_trait]
impl Mechanism for BookkeeperMechanism {
    fn name(&self) -> &str {
        "Bookkeeper promotion mechanism"
    }

    async fn promote(&self, stage: &Stage, freight: Freight) -> PromoteResult {
        let updates: Vec<&GitRepoUpdate> = stage
            .spec
            .promotion_mechanisms
            .git_repo_updates
            .iter()
            .filter(|u| u.bookkeeper)
            .collect();
        if updates.is_empty() {
            return Ok(freight);
        }

        tracing::debug!("executing Bookkeeper-based promotion mechanisms");

        let mut freight = freight;
        for update in updates {
            if let Err(source) = self.do_single_update(update, &mut freight).await {
                return Err(PromoteError {
                    mechanism: self.name().to_string(),
                    freight,
                    source,
                });
            }
        }

        tracing::debug!("done executing Bookkeeper-based promotion mechanisms");
        Ok(freight)
    }
}
