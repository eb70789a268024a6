//! Project tracking backend library.
//!
//! Manages a collection of project records with concurrent-safe partial
//! updates and a live update feed. It handles:
//! - Optimistic-concurrency updates (single and bulk) with version tokens
//! - Soft-delete and recovery without version churn
//! - Fan-out of change events to many long-lived streaming clients
//! - Filtered/sorted listing and filter discovery
//!
//! # Architecture
//!
//! The crate follows a modular architecture:
//! - `model`: project record, enums, patch/input types
//! - `store`: the repository interface the core depends on
//! - `db`: SQLite-backed store implementation with migrations
//! - `mutator`: version-checked mutations
//! - `notify`: bridges committed mutations onto the event bus
//! - `bus`: subscriber registry and SSE streaming sessions
//! - `query`: filter/search/sort interpretation
//!
//! Everything is explicitly owned and injected: a server wires one
//! `EventBus`, one store, one `VersionedMutator` and one
//! `QueryFilterEngine` at startup, and opens a `StreamSession` per
//! streaming client.

pub mod bus;
pub mod db;
pub mod model;
pub mod mutator;
pub mod notify;
pub mod query;
pub mod store;

#[cfg(test)]
mod tests;

pub use bus::{EventBus, StreamSession, Subscription};
pub use db::{Database, SqliteRecordStore};
pub use model::{NewProject, Project, ProjectHealth, ProjectPatch, ProjectStatus};
pub use mutator::{parse_if_match, weak_etag, BulkChanges, BulkOutcome, MutationError, VersionedMutator};
pub use notify::{ChangeKind, ChangeNotifier};
pub use query::{FilterParams, QueryFilterEngine};
pub use store::{QuerySpec, RecordStore, StoreError};

/// Install the default tracing subscriber. Call once at process start.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "projecthub=debug,info".parse().expect("valid env filter")),
        )
        .init();
}
