//! Freight model
//!
//! Freight is the bundle of artifacts (git commits, container images and Helm
//! charts) that gets promoted from Stage to Stage. It is treated as a value:
//! mechanisms take one in and hand a (possibly amended) copy back.

use serde::{Deserialize, Serialize};

/// A promotable bundle of artifacts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Freight {
    /// Identifier of this Freight, if it has been assigned one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// One commit per git repository backing an Application source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commits: Vec<GitCommit>,

    /// Container images, by repository
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,

    /// Helm charts, by registry and chart name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<Chart>,
}

/// A specific commit in a git repository
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitCommit {
    #[serde(rename = "repoURL")]
    pub repo_url: String,

    pub id: String,

    /// Commit that should be considered "live" for health checks when it
    /// differs from `id` (e.g. the commit produced by rendering `id`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub health_check_commit: String,
}

/// A tagged container image
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(rename = "repoURL")]
    pub repo_url: String,

    pub tag: String,
}

/// A specific version of a Helm chart
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    #[serde(rename = "registryURL")]
    pub registry_url: String,

    pub name: String,

    pub version: String,
}

impl GitCommit {
    /// Revision to compare against an Application's live sync revision
    pub fn health_check_revision(&self) -> &str {
        if self.health_check_commit.is_empty() {
            &self.id
        } else {
            &self.health_check_commit
        }
    }
}

impl Freight {
    /// Find the commit for a repository
    ///
    /// Duplicate entries for the same repository resolve to the last one.
    pub fn commit_for(&self, repo_url: &str) -> Option<&GitCommit> {
        self.commits.iter().rev().find(|c| c.repo_url == repo_url)
    }

    /// Mutable variant of [`Freight::commit_for`]
    pub fn commit_for_mut(&mut self, repo_url: &str) -> Option<&mut GitCommit> {
        self.commits.iter_mut().rev().find(|c| c.repo_url == repo_url)
    }

    /// Find the first chart published to `registry_url` under `name`
    pub fn chart_for(&self, registry_url: &str, name: &str) -> Option<&Chart> {
        self.charts
            .iter()
            .find(|c| c.registry_url == registry_url && c.name == name)
    }

    /// Find the tag of the first image from `repo_url`
    pub fn image_tag_for(&self, repo_url: &str) -> Option<&str> {
        self.images
            .iter()
            .find(|i| i.repo_url == repo_url)
            .map(|i| i.tag.as_str())
    }

    /// Revision an Application source pointing at `(repo_url, chart)` should
    /// be running, if this Freight says anything about it
    ///
    /// Commits win over charts. For commits the health check commit is
    /// preferred over the commit id.
    pub fn desired_revision_for(&self, repo_url: &str, chart: &str) -> Option<&str> {
        if let Some(commit) = self.commit_for(repo_url) {
            return Some(commit.health_check_revision());
        }
        self.chart_for(repo_url, chart).map(|c| c.version.as_str())
    }
}
