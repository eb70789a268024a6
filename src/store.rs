//! The narrow repository interface the core mutates and queries through.
//!
//! The mutator and filter engine depend on [`RecordStore`] only; the SQLite
//! implementation lives in [`crate::db`]. `mutate_many` is the transactional
//! read-modify-write primitive both single and bulk updates go through, so
//! concurrent writers are serialized at the store rather than in the core.

use thiserror::Error;

use crate::model::Project;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("corrupt record data: {0}")]
    Corrupt(String),
}

/// Ordering key for queries. Unknown caller-supplied keys never reach this
/// enum — the filter engine maps them to the default ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Title,
    Owner,
    Status,
    Health,
    Progress,
    Version,
    LastUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub field: OrderField,
    pub descending: bool,
}

impl Default for Ordering {
    fn default() -> Self {
        // Matches the record model's natural ordering: newest change first.
        Ordering {
            field: OrderField::LastUpdated,
            descending: true,
        }
    }
}

/// A fully interpreted query. Built by the filter engine, executed by the
/// store. All constraints combine with AND except `text`, which is an OR
/// across title/description/tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    /// Exact status match on the stored value. Kept as a raw string so an
    /// unknown status filters to nothing instead of being dropped.
    pub status: Option<String>,
    pub owner_contains: Option<String>,
    pub tags_contain: Option<String>,
    /// Exact health match, raw string for the same reason as `status`.
    pub health: Option<String>,
    pub min_progress: Option<f64>,
    /// `None` means no constraint on the deleted flag.
    pub deleted: Option<bool>,
    /// Case-insensitive free-text search over title, description and tags.
    pub text: Option<String>,
    pub order: Ordering,
}

/// Result of a transactional batch mutation.
#[derive(Debug, Clone)]
pub struct MutateOutcome {
    /// Ids that matched the id list and the deleted-flag constraint.
    pub found_ids: Vec<String>,
    /// Post-save snapshots of the records the closure reported as changed.
    pub updated: Vec<Project>,
}

pub trait RecordStore: Send + Sync {
    /// Look up a record by id, regardless of its deleted flag.
    fn find(&self, id: &str) -> Result<Option<Project>, StoreError>;

    fn query(&self, spec: &QuerySpec) -> Result<Vec<Project>, StoreError>;

    /// Persist a new record. The store stamps `last_updated`; the returned
    /// snapshot reflects what was written.
    fn insert(&self, project: &Project) -> Result<Project, StoreError>;

    /// Read-modify-write the records matching `ids` (and `deleted`, when
    /// given) inside one transactional scope. `apply` runs once per matched
    /// record and returns whether it changed the record; changed records are
    /// persisted with a fresh `last_updated`. Either every changed record is
    /// persisted or none is.
    fn mutate_many(
        &self,
        ids: &[String],
        deleted: Option<bool>,
        apply: &mut dyn FnMut(&mut Project) -> bool,
    ) -> Result<MutateOutcome, StoreError>;

    /// Sorted, deduplicated, non-empty owner values across all records.
    fn distinct_owners(&self) -> Result<Vec<String>, StoreError>;

    /// Sorted, deduplicated tags flattened from every record's tag list.
    fn distinct_tags(&self) -> Result<Vec<String>, StoreError>;
}
