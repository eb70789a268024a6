use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Row};

use super::Database;
use crate::model::{Project, ProjectHealth, ProjectStatus};
use crate::store::{MutateOutcome, OrderField, Ordering, QuerySpec, RecordStore, StoreError};

const COLUMNS: &str =
    "id, title, description, owner, tags_json, status, health, progress, version, is_deleted, last_updated";

/// SQLite-backed [`RecordStore`]. The connection mutex plus per-call
/// transactions give `mutate_many` whole-batch serialization against any
/// concurrent writer.
pub struct SqliteRecordStore {
    db: Arc<Database>,
}

impl SqliteRecordStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl RecordStore for SqliteRecordStore {
    fn find(&self, id: &str) -> Result<Option<Project>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM projects WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(raw) => Ok(Some(raw?.into_project()?)),
            None => Ok(None),
        }
    }

    fn query(&self, spec: &QuerySpec) -> Result<Vec<Project>, StoreError> {
        let mut clauses: Vec<&'static str> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = &spec.status {
            clauses.push("status = ?");
            args.push(Box::new(status.clone()));
        }
        if let Some(owner) = &spec.owner_contains {
            clauses.push("LOWER(owner) LIKE LOWER(?) ESCAPE '\\'");
            args.push(Box::new(like_pattern(owner)));
        }
        if let Some(tags) = &spec.tags_contain {
            clauses.push("LOWER(tags_json) LIKE LOWER(?) ESCAPE '\\'");
            args.push(Box::new(like_pattern(tags)));
        }
        if let Some(health) = &spec.health {
            clauses.push("health = ?");
            args.push(Box::new(health.clone()));
        }
        if let Some(min) = spec.min_progress {
            clauses.push("progress >= ?");
            args.push(Box::new(min));
        }
        if let Some(deleted) = spec.deleted {
            clauses.push("is_deleted = ?");
            args.push(Box::new(deleted));
        }
        if let Some(text) = &spec.text {
            clauses.push(
                "(LOWER(title) LIKE LOWER(?) ESCAPE '\\' \
                 OR LOWER(description) LIKE LOWER(?) ESCAPE '\\' \
                 OR LOWER(tags_json) LIKE LOWER(?) ESCAPE '\\')",
            );
            for _ in 0..3 {
                args.push(Box::new(like_pattern(text)));
            }
        }

        let mut sql = format!("SELECT {COLUMNS} FROM projects");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&order_sql(spec.order));

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let raw_rows = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                read_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        raw_rows.into_iter().map(RawRow::into_project).collect()
    }

    fn insert(&self, project: &Project) -> Result<Project, StoreError> {
        let mut saved = project.clone();
        saved.last_updated = Utc::now();

        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO projects (id, title, description, owner, tags_json, status, health, progress, version, is_deleted, last_updated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                saved.id,
                saved.title,
                saved.description,
                saved.owner,
                tags_to_json(&saved.tags)?,
                saved.status.as_str(),
                saved.health.as_str(),
                saved.progress,
                saved.version,
                saved.is_deleted,
                timestamp(saved.last_updated),
            ],
        )?;
        Ok(saved)
    }

    fn mutate_many(
        &self,
        ids: &[String],
        deleted: Option<bool>,
        apply: &mut dyn FnMut(&mut Project) -> bool,
    ) -> Result<MutateOutcome, StoreError> {
        if ids.is_empty() {
            return Ok(MutateOutcome {
                found_ids: Vec::new(),
                updated: Vec::new(),
            });
        }

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut sql = format!("SELECT {COLUMNS} FROM projects WHERE id IN ({placeholders})");
        if deleted.is_some() {
            sql.push_str(" AND is_deleted = ?");
        }

        let mut args: Vec<Box<dyn rusqlite::ToSql>> = ids
            .iter()
            .map(|id| Box::new(id.clone()) as Box<dyn rusqlite::ToSql>)
            .collect();
        if let Some(flag) = deleted {
            args.push(Box::new(flag));
        }

        let raw_rows = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                    read_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let now = Utc::now();
        let mut found_ids = Vec::with_capacity(raw_rows.len());
        let mut updated = Vec::new();

        for raw in raw_rows {
            let mut project = raw.into_project()?;
            found_ids.push(project.id.clone());

            if apply(&mut project) {
                project.last_updated = now;
                tx.execute(
                    "UPDATE projects SET title = ?2, description = ?3, owner = ?4, tags_json = ?5, \
                     status = ?6, health = ?7, progress = ?8, version = ?9, is_deleted = ?10, last_updated = ?11 \
                     WHERE id = ?1",
                    params![
                        project.id,
                        project.title,
                        project.description,
                        project.owner,
                        tags_to_json(&project.tags)?,
                        project.status.as_str(),
                        project.health.as_str(),
                        project.progress,
                        project.version,
                        project.is_deleted,
                        timestamp(project.last_updated),
                    ],
                )?;
                updated.push(project);
            }
        }

        tx.commit()?;
        Ok(MutateOutcome { found_ids, updated })
    }

    fn distinct_owners(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.db.conn();
        let mut stmt =
            conn.prepare("SELECT DISTINCT owner FROM projects WHERE owner <> '' ORDER BY owner")?;
        let owners = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(owners)
    }

    fn distinct_tags(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT tags_json FROM projects")?;
        let blobs = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut tags = BTreeSet::new();
        for blob in blobs {
            for tag in parse_tags(&blob) {
                let trimmed = tag.trim().to_string();
                if !trimmed.is_empty() {
                    tags.insert(trimmed);
                }
            }
        }
        Ok(tags.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct RawRow {
    id: String,
    title: String,
    description: String,
    owner: String,
    tags_json: String,
    status: String,
    health: String,
    progress: f64,
    version: i64,
    is_deleted: bool,
    last_updated: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        owner: row.get(3)?,
        tags_json: row.get(4)?,
        status: row.get(5)?,
        health: row.get(6)?,
        progress: row.get(7)?,
        version: row.get(8)?,
        is_deleted: row.get(9)?,
        last_updated: row.get(10)?,
    })
}

impl RawRow {
    fn into_project(self) -> Result<Project, StoreError> {
        let status = ProjectStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown status `{}` on project {}", self.status, self.id))
        })?;
        let health = ProjectHealth::parse(&self.health).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown health `{}` on project {}", self.health, self.id))
        })?;
        let last_updated = DateTime::parse_from_rfc3339(&self.last_updated)
            .map_err(|e| {
                StoreError::Corrupt(format!("bad timestamp on project {}: {e}", self.id))
            })?
            .with_timezone(&Utc);

        Ok(Project {
            tags: parse_tags(&self.tags_json),
            id: self.id,
            title: self.title,
            description: self.description,
            owner: self.owner,
            status,
            health,
            progress: self.progress,
            version: self.version,
            is_deleted: self.is_deleted,
            last_updated,
        })
    }
}

/// Tags are stored as a JSON array. Legacy rows may carry a bare
/// comma-separated string; tolerate both shapes here so the core only ever
/// sees a list.
fn parse_tags(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(tags) => tags,
        Err(_) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    }
}

fn tags_to_json(tags: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(tags).map_err(|e| StoreError::Backend(e.to_string()))
}

/// Build a contains pattern with LIKE metacharacters escaped, so
/// caller-supplied substrings match literally.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Fixed-width RFC 3339 so lexicographic ordering matches chronological.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn order_sql(order: Ordering) -> String {
    let column = match order.field {
        OrderField::Title => "title",
        OrderField::Owner => "owner",
        OrderField::Status => "status",
        OrderField::Health => "health",
        OrderField::Progress => "progress",
        OrderField::Version => "version",
        OrderField::LastUpdated => "last_updated",
    };
    let direction = if order.descending { "DESC" } else { "ASC" };
    format!(" ORDER BY {column} {direction}")
}
