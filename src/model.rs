//! Project record types shared across the crate.
//!
//! `Project` is the canonical record shape; the storage layer owns row
//! mapping, the mutator owns version bookkeeping. Tags are modeled as an
//! ordered list of strings and treated as a set for membership checks —
//! any legacy scalar-tag representation is the storage layer's problem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
    Planning,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 4] = [
        ProjectStatus::Active,
        ProjectStatus::Paused,
        ProjectStatus::Completed,
        ProjectStatus::Planning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Planning => "planning",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == value)
    }

    /// The fixed choice list, as exposed by the filter-discovery endpoint.
    pub fn choices() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectHealth {
    Good,
    Warning,
    Critical,
}

impl ProjectHealth {
    pub const ALL: [ProjectHealth; 3] = [
        ProjectHealth::Good,
        ProjectHealth::Warning,
        ProjectHealth::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectHealth::Good => "good",
            ProjectHealth::Warning => "warning",
            ProjectHealth::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|h| h.as_str() == value)
    }

    pub fn choices() -> Vec<&'static str> {
        Self::ALL.iter().map(|h| h.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub owner: String,
    pub tags: Vec<String>,
    pub status: ProjectStatus,
    pub health: ProjectHealth,
    pub progress: f64,
    /// Optimistic-concurrency token. Starts at 1, +1 per successful mutation.
    pub version: i64,
    pub is_deleted: bool,
    /// Set by the storage layer on every write.
    pub last_updated: DateTime<Utc>,
}

impl Project {
    /// Append `tag` unless it is already present. Returns whether the tag
    /// list changed.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }
}

/// Input for creating a project. Missing fields take the record defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub health: Option<ProjectHealth>,
    #[serde(default)]
    pub progress: Option<f64>,
}

/// Partial update for a single project. `None` fields are left untouched;
/// id, version, is_deleted and last_updated are never writable through a
/// patch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
    pub health: Option<ProjectHealth>,
    pub progress: Option<f64>,
}

impl ProjectPatch {
    pub fn apply(&self, project: &mut Project) {
        if let Some(title) = &self.title {
            project.title = title.clone();
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
        if let Some(owner) = &self.owner {
            project.owner = owner.clone();
        }
        if let Some(tags) = &self.tags {
            project.tags = tags.clone();
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(health) = self.health {
            project.health = health;
        }
        if let Some(progress) = self.progress {
            project.progress = progress;
        }
    }
}
