//! Promotion engine model layer
//!
//! Structure:
//! - `freight.rs` - Freight (commits, images, charts) and lookups over it
//! - `stage.rs` - Stage resource and its promotion mechanism configuration
//! - `application.rs` - the subset of Argo CD's Application this crate touches
//! - `health.rs` - Stage health verdicts

pub mod application;
pub mod freight;
pub mod health;
pub mod stage;

pub use application::{
    Application, ApplicationSource, ApplicationSourceHelm, ApplicationSourceKustomize,
    HelmParameter, Operation, OperationInitiator, SyncOperation, SyncPolicy,
};
pub use freight::{Chart, Freight, GitCommit, Image};
pub use health::{Health, HealthState};
pub use stage::{
    ArgoCDAppUpdate, ArgoCDHelm, ArgoCDHelmImageUpdate, ArgoCDKustomize, ArgoCDSourceUpdate,
    GitRepoUpdate, ImageUpdateValueType, PromotionMechanisms, Stage, StageSpec,
};
