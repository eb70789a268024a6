//! Interprets raw filter/search/sort parameters into a [`QuerySpec`].
//!
//! Matches the lenient contract of the listing endpoint: substring filters
//! are case-insensitive, free-text search ORs across title/description/tags,
//! unparseable numeric thresholds are silently ignored, and soft-deleted
//! records are excluded unless explicitly requested.

use std::sync::Arc;

use crate::model::{Project, ProjectHealth, ProjectStatus};
use crate::store::{OrderField, Ordering, QuerySpec, RecordStore, StoreError};

/// Raw, unvalidated filter parameters as a caller (usually an HTTP layer)
/// would hand them over. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct FilterParams {
    pub status: Option<String>,
    pub owner: Option<String>,
    pub tags: Option<String>,
    pub health: Option<String>,
    /// Minimum progress threshold. Parsed leniently: anything that is not a
    /// number is ignored rather than rejected.
    pub min_progress: Option<String>,
    /// `"true"` selects deleted records; any other value selects live ones;
    /// absent means the default live-only scope.
    pub is_deleted: Option<String>,
    /// Free-text search across title, description and tags.
    pub q: Option<String>,
    /// Ordering key, `-` prefix for descending. Unknown keys fall back to
    /// the default (last_updated descending).
    pub ordering: Option<String>,
}

pub struct QueryFilterEngine {
    store: Arc<dyn RecordStore>,
}

impl QueryFilterEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Pure interpretation step: params in, query spec out.
    pub fn build_spec(params: &FilterParams) -> QuerySpec {
        let deleted = match non_empty(&params.is_deleted) {
            Some(value) => Some(value == "true"),
            None => Some(false),
        };

        QuerySpec {
            status: non_empty(&params.status).map(String::from),
            owner_contains: non_empty(&params.owner).map(String::from),
            tags_contain: non_empty(&params.tags).map(String::from),
            health: non_empty(&params.health).map(String::from),
            min_progress: non_empty(&params.min_progress).and_then(|raw| raw.parse().ok()),
            deleted,
            text: non_empty(&params.q).map(String::from),
            order: non_empty(&params.ordering)
                .and_then(parse_ordering)
                .unwrap_or_default(),
        }
    }

    pub fn list(&self, params: &FilterParams) -> Result<Vec<Project>, StoreError> {
        self.store.query(&Self::build_spec(params))
    }

    /// The dedicated deleted listing: soft-deleted records only, newest
    /// change first.
    pub fn list_deleted(&self) -> Result<Vec<Project>, StoreError> {
        self.store.query(&QuerySpec {
            deleted: Some(true),
            ..QuerySpec::default()
        })
    }

    // Filter-discovery helpers, backing the filters/* endpoints.

    pub fn owners(&self) -> Result<Vec<String>, StoreError> {
        self.store.distinct_owners()
    }

    pub fn tags(&self) -> Result<Vec<String>, StoreError> {
        self.store.distinct_tags()
    }

    pub fn statuses() -> Vec<&'static str> {
        ProjectStatus::choices()
    }

    pub fn healths() -> Vec<&'static str> {
        ProjectHealth::choices()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn parse_ordering(raw: &str) -> Option<Ordering> {
    let (key, descending) = match raw.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (raw, false),
    };
    let field = match key {
        "title" => OrderField::Title,
        "owner" => OrderField::Owner,
        "status" => OrderField::Status,
        "health" => OrderField::Health,
        "progress" => OrderField::Progress,
        "version" => OrderField::Version,
        "last_updated" => OrderField::LastUpdated,
        _ => return None,
    };
    Some(Ordering { field, descending })
}
