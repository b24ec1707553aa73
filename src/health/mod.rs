//! Stage health assessment
//!
//! Health is re-derived from scratch on every call by looking at the Argo CD
//! Applications a Stage updates. It never fails: anything that prevents an
//! assessment is folded into an `Unknown` status with an explanatory issue.

use crate::argocd::{ApplicationStore, HealthEvaluatorFn, is_application_healthy_and_synced};
use crate::models::{ArgoCDAppUpdate, Freight, Health, HealthState};
use crate::promotion::EngineSettings;
use std::sync::Arc;

/// Assesses Stage health from its Argo CD Applications
pub struct HealthChecker {
    store: Arc<dyn ApplicationStore>,
    argocd_namespace: String,
    evaluate_fn: HealthEvaluatorFn,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn ApplicationStore>, settings: &EngineSettings) -> Self {
        Self::with_evaluator(store, settings, is_application_healthy_and_synced)
    }

    /// Build a checker with a replacement application evaluator
    pub fn with_evaluator(
        store: Arc<dyn ApplicationStore>,
        settings: &EngineSettings,
        evaluate_fn: HealthEvaluatorFn,
    ) -> Self {
        Self {
            store,
            argocd_namespace: settings.argocd_namespace.clone(),
            evaluate_fn,
        }
    }

    /// Assess the health of a Stage currently running `freight`
    pub async fn check_health(&self, freight: &Freight, checks: &[ArgoCDAppUpdate]) -> Health {
        if checks.is_empty() {
            return Health {
                status: HealthState::Unknown,
                issues: vec!["no spec.promotionMechanisms.argoCDAppUpdates are defined".to_string()],
            };
        }

        // Start healthy and degrade as issues are found
        let mut health = Health::healthy();

        for check in checks {
            let name = check.app_name.as_str();
            let namespace = check.app_namespace_or(&self.argocd_namespace);

            let app = match self.store.get(namespace, name).await {
                Err(e) => {
                    health.record_unknown(format!(
                        "error finding Argo CD Application {:?} in namespace {:?}: {}",
                        name, namespace, e
                    ));
                    continue;
                }
                Ok(None) => {
                    health.record_unknown(format!(
                        "unable to find Argo CD Application {:?} in namespace {:?}",
                        name, namespace
                    ));
                    continue;
                }
                Ok(Some(app)) => app,
            };

            // Argo CD can't yet report multi-source health precisely enough
            // to compare against; report it as indeterminate rather than fail.
            if app.is_multi_source() {
                tracing::warn!(
                    app = name,
                    namespace,
                    "skipping health assessment of multi-source Application"
                );
                health.record_unknown(format!(
                    "bugs in Argo CD currently prevent a comprehensive assessment of the \
                     health of multi-source Application {:?} in namespace {:?}",
                    name, namespace
                ));
                continue;
            }
            let Some(source) = &app.spec.source else {
                health.record_unknown(format!(
                    "Argo CD Application {:?} in namespace {:?} has no source",
                    name, namespace
                ));
                continue;
            };

            let desired_revision = freight
                .desired_revision_for(&source.repo_url, &source.chart)
                .unwrap_or_default();

            let (healthy, reason) = (self.evaluate_fn)(&app, desired_revision);
            if !healthy {
                health.record_unhealthy(reason);
            }
        }

        tracing::debug!(status = %health.status, issues = health.issues.len(), "assessed health");
        health
    }
}
