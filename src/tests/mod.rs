//! Test helpers and utilities for integration tests.
//!
//! Wires the full stack — in-memory store, event bus, notifier, mutator and
//! filter engine — the same way a server process would at startup.

use std::sync::Arc;

use crate::bus::EventBus;
use crate::db::{Database, SqliteRecordStore};
use crate::model::NewProject;
use crate::mutator::VersionedMutator;
use crate::notify::ChangeNotifier;
use crate::query::QueryFilterEngine;
use crate::store::RecordStore;


pub struct TestStack {
    pub bus: Arc<EventBus>,
    pub mutator: VersionedMutator,
    pub engine: QueryFilterEngine,
}

pub fn stack() -> TestStack {
    let db = Arc::new(Database::open_in_memory().expect("in-memory DB"));
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(db));
    let bus = Arc::new(EventBus::new());
    let mutator = VersionedMutator::new(store.clone(), ChangeNotifier::new(bus.clone()));
    let engine = QueryFilterEngine::new(store);
    TestStack {
        bus,
        mutator,
        engine,
    }
}

pub fn project(title: &str) -> NewProject {
    NewProject {
        title: title.to_string(),
        owner: "Alex".to_string(),
        ..NewProject::default()
    }
}
