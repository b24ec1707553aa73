//! Stage health model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall health verdict
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::Healthy => "Healthy",
            HealthState::Unhealthy => "Unhealthy",
            HealthState::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Result of a single health assessment
///
/// Built fresh for every assessment. Status only ever degrades while issues
/// are recorded: `Unhealthy` is never replaced, and `Unknown` never replaces
/// `Unhealthy`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: HealthState,

    #[serde(default)]
    pub issues: Vec<String>,
}

impl Health {
    /// Starting point for an assessment that has something to check
    pub fn healthy() -> Self {
        Self {
            status: HealthState::Healthy,
            issues: Vec::new(),
        }
    }

    /// Record an issue that makes health indeterminate
    pub fn record_unknown(&mut self, issue: impl Into<String>) {
        if self.status != HealthState::Unhealthy {
            self.status = HealthState::Unknown;
        }
        self.issues.push(issue.into());
    }

    /// Record an issue that makes the Stage unhealthy
    pub fn record_unhealthy(&mut self, issue: impl Into<String>) {
        self.status = HealthState::Unhealthy;
        self.issues.push(issue.into());
    }
}
