//! Optimistic-concurrency-controlled mutations.
//!
//! All writes go through [`VersionedMutator`], which runs the
//! read-check-write cycle inside the store's transactional
//! [`mutate_many`](crate::store::RecordStore::mutate_many) so concurrent
//! writers targeting the same records are serialized. Every committed
//! mutation notifies the [`ChangeNotifier`]; notification failures never
//! reach the caller.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{NewProject, Project, ProjectHealth, ProjectPatch, ProjectStatus};
use crate::notify::{ChangeKind, ChangeNotifier};
use crate::store::{RecordStore, StoreError};

/// Mutation failure taxonomy. An HTTP layer maps these as: NotFound → 404,
/// VersionConflict → 409 with `current_version` attached, Validation → 400,
/// Store → 500. The core never retries.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("project not found")]
    NotFound,
    #[error("version mismatch: resource has been modified, current version is {current_version}")]
    VersionConflict { current_version: i64 },
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome counts of a bulk operation.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub updated_count: usize,
    pub requested_ids: Vec<String>,
    pub found_ids: Vec<String>,
}

/// Optional field changes applied uniformly by `bulk_update`. Status and
/// health arrive as raw strings and are validated against the enums; empty
/// strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct BulkChanges {
    pub status: Option<String>,
    pub owner: Option<String>,
    pub health: Option<String>,
    /// Single tag to add; a no-op for records that already carry it.
    pub tag: Option<String>,
}

/// Weak validator token for a record version, e.g. `W/"3"`.
pub fn weak_etag(version: i64) -> String {
    format!("W/\"{version}\"")
}

/// Parse an `If-Match` style header into candidate version numbers.
/// Tolerates `W/` prefixes and quoting; non-numeric entries are skipped.
pub fn parse_if_match(header: &str) -> Vec<i64> {
    header
        .split(',')
        .filter_map(|token| {
            let cleaned = token.trim().trim_start_matches("W/").trim().trim_matches('"');
            cleaned.parse().ok()
        })
        .collect()
}

pub struct VersionedMutator {
    store: Arc<dyn RecordStore>,
    notifier: ChangeNotifier,
}

impl VersionedMutator {
    pub fn new(store: Arc<dyn RecordStore>, notifier: ChangeNotifier) -> Self {
        Self { store, notifier }
    }

    /// Create a record at version 1 and announce it.
    pub fn create(&self, input: NewProject) -> Result<Project, MutationError> {
        if input.title.trim().is_empty() {
            return Err(MutationError::Validation("`title` must not be empty.".into()));
        }

        let project = Project {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            description: input.description,
            owner: input.owner,
            tags: input.tags,
            status: input.status.unwrap_or(ProjectStatus::Active),
            health: input.health.unwrap_or(ProjectHealth::Good),
            progress: input.progress.unwrap_or(0.0),
            version: 1,
            is_deleted: false,
            last_updated: Utc::now(),
        };

        let saved = self.store.insert(&project)?;
        self.notifier.notify(ChangeKind::Created, &saved);
        Ok(saved)
    }

    /// Conditionally update one record.
    ///
    /// With `expected_version` set, a mismatch against the current version
    /// fails with [`MutationError::VersionConflict`] carrying the current
    /// version, and nothing is written. Soft-deleted records are not
    /// updatable; recover them first. Returns the new state plus its weak
    /// validator token.
    pub fn update(
        &self,
        id: &str,
        patch: &ProjectPatch,
        expected_version: Option<i64>,
    ) -> Result<(Project, String), MutationError> {
        let ids = vec![id.to_string()];
        let mut conflict: Option<i64> = None;

        let outcome = self.store.mutate_many(&ids, Some(false), &mut |project| {
            if let Some(expected) = expected_version {
                if expected != project.version {
                    conflict = Some(project.version);
                    return false;
                }
            }
            patch.apply(project);
            project.version += 1;
            true
        })?;

        if let Some(current_version) = conflict {
            return Err(MutationError::VersionConflict { current_version });
        }

        let project = outcome
            .updated
            .into_iter()
            .next()
            .ok_or(MutationError::NotFound)?;

        self.notifier.notify(ChangeKind::Updated, &project);
        let token = weak_etag(project.version);
        Ok((project, token))
    }

    /// Apply the provided fields to every matching non-deleted record in one
    /// transactional batch. Records whose fields actually change get a
    /// version bump and a change event; untouched records count as found but
    /// not updated.
    pub fn bulk_update(
        &self,
        ids: Vec<String>,
        changes: &BulkChanges,
    ) -> Result<BulkOutcome, MutationError> {
        if ids.is_empty() {
            return Err(MutationError::Validation(
                "`ids` must be a non-empty list of project IDs.".into(),
            ));
        }

        let status = match non_empty(&changes.status) {
            Some(raw) => Some(ProjectStatus::parse(raw).ok_or_else(|| {
                MutationError::Validation(format!(
                    "`status` must be one of {:?}",
                    ProjectStatus::choices()
                ))
            })?),
            None => None,
        };
        let health = match non_empty(&changes.health) {
            Some(raw) => Some(ProjectHealth::parse(raw).ok_or_else(|| {
                MutationError::Validation(format!(
                    "`health` must be one of {:?}",
                    ProjectHealth::choices()
                ))
            })?),
            None => None,
        };
        let owner = non_empty(&changes.owner).map(String::from);
        let tag = non_empty(&changes.tag).map(String::from);

        let outcome = self.store.mutate_many(&ids, Some(false), &mut |project| {
            let mut changed = false;
            if let Some(status) = status {
                project.status = status;
                changed = true;
            }
            if let Some(owner) = &owner {
                project.owner = owner.clone();
                changed = true;
            }
            if let Some(health) = health {
                project.health = health;
                changed = true;
            }
            if let Some(tag) = &tag {
                if project.add_tag(tag) {
                    changed = true;
                }
            }
            if changed {
                project.version += 1;
            }
            changed
        })?;

        if outcome.found_ids.is_empty() {
            return Err(MutationError::NotFound);
        }

        for project in &outcome.updated {
            self.notifier.notify(ChangeKind::Updated, project);
        }

        Ok(BulkOutcome {
            updated_count: outcome.updated.len(),
            requested_ids: ids,
            found_ids: outcome.found_ids,
        })
    }

    /// Soft-delete: flips the flag without touching the version. Idempotent;
    /// deleting an already-deleted record just refreshes `last_updated`.
    /// Emits an `updated` event carrying `is_deleted: true`.
    pub fn soft_delete(&self, id: &str) -> Result<Project, MutationError> {
        self.set_deleted(id, true)
    }

    /// Restore a soft-deleted record back into the default listing. The
    /// version is left untouched.
    pub fn restore(&self, id: &str) -> Result<Project, MutationError> {
        self.set_deleted(id, false)
    }

    /// Restore every matching soft-deleted record. Unlike `bulk_update`,
    /// zero matches is not an error — the outcome just reports zero counts.
    pub fn bulk_recover(&self, ids: Vec<String>) -> Result<BulkOutcome, MutationError> {
        if ids.is_empty() {
            return Err(MutationError::Validation(
                "`ids` must be a non-empty list of project IDs.".into(),
            ));
        }

        let outcome = self.store.mutate_many(&ids, Some(true), &mut |project| {
            project.is_deleted = false;
            true
        })?;

        for project in &outcome.updated {
            self.notifier.notify(ChangeKind::Updated, project);
        }

        Ok(BulkOutcome {
            updated_count: outcome.updated.len(),
            requested_ids: ids,
            found_ids: outcome.found_ids,
        })
    }

    fn set_deleted(&self, id: &str, deleted: bool) -> Result<Project, MutationError> {
        let ids = vec![id.to_string()];
        let outcome = self.store.mutate_many(&ids, None, &mut |project| {
            project.is_deleted = deleted;
            true
        })?;

        let project = outcome
            .updated
            .into_iter()
            .next()
            .ok_or(MutationError::NotFound)?;

        self.notifier.notify(ChangeKind::Updated, &project);
        Ok(project)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
