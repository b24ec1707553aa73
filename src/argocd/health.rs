//! Argo CD health and sync evaluation
//!
//! This does not re-implement Argo CD's health assessment. It reads the
//! verdicts Argo CD has already written to the Application's status and
//! checks that the synced revision is the one the Stage expects.

use crate::models::Application;

/// Signature of an application health/sync evaluator
///
/// Returns `(healthy, reason)`. `reason` is empty when healthy.
pub type HealthEvaluatorFn = fn(&Application, &str) -> (bool, String);

const HEALTH_STATUS_HEALTHY: &str = "Healthy";
const SYNC_STATUS_SYNCED: &str = "Synced";

/// Check that an Application is healthy, synced, and (if `desired_revision`
/// is non-empty) synced to `desired_revision`
pub fn is_application_healthy_and_synced(
    app: &Application,
    desired_revision: &str,
) -> (bool, String) {
    let Some(status) = &app.status else {
        return (
            false,
            format!(
                "Argo CD Application {:?} in namespace {:?} has no status",
                app.name(),
                app.namespace()
            ),
        );
    };

    let health = status.health.as_ref().map(|h| h.status.as_str()).unwrap_or_default();
    if health != HEALTH_STATUS_HEALTHY {
        let mut reason = format!(
            "Argo CD Application {:?} in namespace {:?} has health state {:?}",
            app.name(),
            app.namespace(),
            health
        );
        let message = status.health.as_ref().map(|h| h.message.as_str()).unwrap_or_default();
        if !message.is_empty() {
            reason.push_str(&format!(": {}", message));
        }
        return (false, reason);
    }

    let sync = status.sync.as_ref();
    let sync_status = sync.map(|s| s.status.as_str()).unwrap_or_default();
    if sync_status != SYNC_STATUS_SYNCED {
        return (
            false,
            format!(
                "Argo CD Application {:?} in namespace {:?} has sync state {:?}",
                app.name(),
                app.namespace(),
                sync_status
            ),
        );
    }

    let synced_revision = sync.map(|s| s.revision.as_str()).unwrap_or_default();
    if !desired_revision.is_empty() && synced_revision != desired_revision {
        return (
            false,
            format!(
                "sync revision of Argo CD Application {:?} in namespace {:?} is {:?}; \
                 expected {:?}",
                app.name(),
                app.namespace(),
                synced_revision,
                desired_revision
            ),
        );
    }

    (true, String::new())
}
