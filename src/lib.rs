//! Kargo promotion engine
//!
//! Moves Freight (a bundle of commits, images and charts) into Stages by
//! driving Argo CD Applications and, optionally, Bookkeeper rendering, and
//! assesses the health of a Stage afterwards.
//!
//! It can be used both as a binary and as a library for testing.

pub mod argocd;
pub mod bookkeeper;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod health;
pub mod kube;
pub mod models;
pub mod promotion;

// Re-export commonly used types for convenience
pub use error::{PromoteError, PromoteResult, PromotionError, PromotionResult};
pub use health::HealthChecker;
pub use models::{Freight, Health, HealthState, Stage};
pub use promotion::{
    ArgoCDMechanism, BookkeeperMechanism, CompositeMechanism, EngineSettings, Mechanism,
    new_mechanisms,
};
