//! Composite promotion mechanism

use super::Mechanism;
use crate::error::PromoteResult;
use crate::models::{Freight, Stage};
use async_trait::async_trait;

/// Runs a list of mechanisms in order, feeding each the Freight returned by
/// the previous one
///
/// Stops at the first failure. The error carries the Freight as the failing
/// mechanism left it, so partial progress stays visible.
pub struct CompositeMechanism {
    name: String,
    mechanisms: Vec<Box<dyn Mechanism>>,
}

impl CompositeMechanism {
    pub fn new(name: impl Into<String>, mechanisms: Vec<Box<dyn Mechanism>>) -> Self {
        Self {
            name: name.into(),
            mechanisms,
        }
    }

    /// Names of the wrapped mechanisms, in execution order
    pub fn mechanism_names(&self) -> Vec<&str> {
        self.mechanisms.iter().map(|m| m.name()).collect()
    }
}

#[async_trait]
impl Mechanism for CompositeMechanism {
    fn name(&self) -> &str {
        &self.name
    }

    async fn promote(&self, stage: &Stage, freight: Freight) -> PromoteResult {
        tracing::debug!("executing {}", self.name);

        let mut freight = freight;
        for mechanism in &self.mechanisms {
            freight = mechanism.promote(stage, freight).await?;
        }

        tracing::debug!("done executing {}", self.name);
        Ok(freight)
    }
}
