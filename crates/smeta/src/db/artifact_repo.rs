//! Artifact repository: references to rendered blobs owned by a request.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRow {
    pub id: String,
    pub request_id: String,
    pub stage: String,
    pub kind: String,
    pub file_name: String,
    pub file_path: String,
    pub size_bytes: i64,
    pub created_at: String,
}

impl ArtifactRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            request_id: row.get("request_id")?,
            stage: row.get("stage")?,
            kind: row.get("kind")?,
            file_name: row.get("file_name")?,
            file_path: row.get("file_path")?,
            size_bytes: row.get("size_bytes")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(db: &Database, artifact: &ArtifactRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO artifacts (id, request_id, stage, kind, file_name, file_path,
             size_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                artifact.id,
                artifact.request_id,
                artifact.stage,
                artifact.kind,
                artifact.file_name,
                artifact.file_path,
                artifact.size_bytes,
                artifact.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ArtifactRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM artifacts WHERE id = ?1",
                params![id],
                ArtifactRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds the artifact stored under `file_name`.
///
/// A name shared by more than one artifact resolves to nothing: it cannot
/// say whose file is meant.
pub fn find_by_name(db: &Database, file_name: &str) -> Result<Option<ArtifactRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM artifacts WHERE file_name = ?1 ORDER BY rowid LIMIT 2")?;
        let mut rows = stmt
            .query_map(params![file_name], ArtifactRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        if rows.len() > 1 {
            log::warn!("Artifact name '{}' is not unique, refusing lookup", file_name);
            return Ok(None);
        }
        Ok(rows.pop())
    })
}

/// All artifacts of one request in the order they were written.
pub fn list_for_request(
    db: &Database,
    request_id: &str,
) -> Result<Vec<ArtifactRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM artifacts WHERE request_id = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map(params![request_id], ArtifactRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
