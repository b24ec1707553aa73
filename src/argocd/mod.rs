//! Argo CD integration
//!
//! Provides the [`ApplicationStore`] seam used to read and patch Argo CD
//! Applications, and the default evaluator used to decide whether an
//! Application is running what a Stage expects.

pub mod health;
pub mod store;

pub use health::{HealthEvaluatorFn, is_application_healthy_and_synced};
pub use store::{ApplicationStore, KubeApplicationStore};
