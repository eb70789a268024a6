//! Bridges successful mutations to the event bus.

use std::sync::Arc;

use serde::Serialize;

use crate::bus::EventBus;
use crate::model::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
}

impl ChangeKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            ChangeKind::Created => "project_created",
            ChangeKind::Updated => "project_updated",
        }
    }
}

/// The minimal per-record payload streamed to clients. Soft-deletes show up
/// as an update with `is_deleted: true`; there is no separate delete event.
#[derive(Debug, Serialize)]
struct ProjectSummary<'a> {
    id: &'a str,
    title: &'a str,
    owner: &'a str,
    status: &'a str,
    health: &'a str,
    progress: f64,
    last_updated: String,
    is_deleted: bool,
}

#[derive(Debug, Serialize)]
struct ChangeEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    project: ProjectSummary<'a>,
}

/// Publishes change events for committed mutations. Notification is
/// best-effort: the mutation has already succeeded by the time this runs,
/// so failures are logged and swallowed, never surfaced to the caller.
pub struct ChangeNotifier {
    bus: Arc<EventBus>,
}

impl ChangeNotifier {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    pub fn notify(&self, kind: ChangeKind, project: &Project) {
        let event = ChangeEvent {
            kind: kind.event_type(),
            project: ProjectSummary {
                id: &project.id,
                title: &project.title,
                owner: &project.owner,
                status: project.status.as_str(),
                health: project.health.as_str(),
                progress: project.progress,
                last_updated: project.last_updated.to_rfc3339(),
                is_deleted: project.is_deleted,
            },
        };

        match self.bus.publish(&event) {
            Ok(delivered) => {
                tracing::debug!(
                    project = %project.id,
                    event = event.kind,
                    delivered,
                    "published change event"
                );
            }
            Err(e) => {
                tracing::warn!(project = %project.id, "failed to serialize change event: {e}");
            }
        }
    }
}
