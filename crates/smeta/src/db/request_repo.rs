//! Request repository: rows of the `requests` table and their status log.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw request row from the database.
#[derive(Debug, Clone)]
pub struct RequestRow {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
    pub input_type: String,
    /// JSON array of input descriptors.
    pub input_files: String,
    /// JSON array of requested output kinds.
    pub requested_outputs: String,
    pub annotation: Option<String>,
    pub status: String,
    pub current_stage: Option<String>,
    pub last_prompt: Option<String>,
    pub last_response: Option<String>,
    pub error_message: Option<String>,
}

impl RequestRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
            input_type: row.get("input_type")?,
            input_files: row.get("input_files")?,
            requested_outputs: row.get("requested_outputs")?,
            annotation: row.get("annotation")?,
            status: row.get("status")?,
            current_stage: row.get("current_stage")?,
            last_prompt: row.get("last_prompt")?,
            last_response: row.get("last_response")?,
            error_message: row.get("error_message")?,
        })
    }
}

/// One entry of the append-only `request_events` log.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub request_id: String,
    pub status: String,
    pub stage: Option<String>,
    pub message: Option<String>,
    pub created_at: String,
}

/// A guarded status change: applied only while the row still has `from`.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub stage: Option<&'a str>,
    pub message: Option<&'a str>,
    /// Set on terminal transitions.
    pub completed: bool,
    pub at: &'a str,
}

/// Inserts a new request row together with its first status event.
pub fn insert(db: &Database, request: &RequestRow) -> Result<(), DatabaseError> {
    db.with_transaction(|tx| {
        tx.execute(
            "INSERT INTO requests (id, created_at, updated_at, completed_at, input_type,
             input_files, requested_outputs, annotation, status, current_stage,
             last_prompt, last_response, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                request.id,
                request.created_at,
                request.updated_at,
                request.completed_at,
                request.input_type,
                request.input_files,
                request.requested_outputs,
                request.annotation,
                request.status,
                request.current_stage,
                request.last_prompt,
                request.last_response,
                request.error_message,
            ],
        )?;
        insert_event(
            tx,
            &request.id,
            &request.status,
            None,
            None,
            &request.created_at,
        )?;
        Ok(())
    })
}

/// Deletes a request row. Returns whether a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM requests WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// Finds a request by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<RequestRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM requests WHERE id = ?1",
                params![id],
                RequestRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Returns the newest `limit` requests, newest first.
pub fn recent(db: &Database, limit: usize) -> Result<Vec<RequestRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM requests ORDER BY created_at DESC, rowid DESC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit as i64], RequestRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns the IDs of all requests currently in `status`.
pub fn ids_with_status(db: &Database, status: &str) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT id FROM requests WHERE status = ?1 ORDER BY created_at")?;
        let ids = stmt
            .query_map(params![status], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    })
}

/// Counts requests with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM requests WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Bounds on `created_at`. Timestamps are RFC 3339 text, so date prefixes
/// compare correctly as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedRange {
    /// Inclusive.
    pub from: Option<String>,
    /// Exclusive.
    pub before: Option<String>,
}

/// Requests inside `range`, newest first, skipping `skip` rows. `limit`
/// of `None` returns the rest.
pub fn page(
    db: &Database,
    range: &CreatedRange,
    skip: usize,
    limit: Option<usize>,
) -> Result<Vec<RequestRow>, DatabaseError> {
    let limit = limit.map_or(-1, |l| l as i64);
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM requests
             WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at < ?2)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt
            .query_map(
                params![range.from, range.before, limit, skip as i64],
                RequestRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Number of requests inside `range`.
pub fn count(db: &Database, range: &CreatedRange) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM requests
             WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at < ?2)",
            params![range.from, range.before],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Request counts per non-empty input type, ordered by type.
pub fn count_by_input_type(db: &Database) -> Result<Vec<(String, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT input_type, COUNT(*) FROM requests
             WHERE input_type != '' GROUP BY input_type ORDER BY input_type",
        )?;
        let counts = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<(String, u64)>, _>>()?;
        Ok(counts)
    })
}

/// Applies a compare-and-set status change and logs it.
///
/// Returns `false` (and writes nothing) when the row is missing or its
/// status is no longer `change.from`.
pub fn transition(
    db: &Database,
    id: &str,
    change: &StatusChange<'_>,
) -> Result<bool, DatabaseError> {
    db.with_transaction(|tx| {
        let changed = tx.execute(
            "UPDATE requests
             SET status = ?3,
                 updated_at = ?4,
                 completed_at = CASE WHEN ?5 THEN ?4 ELSE completed_at END,
                 error_message = COALESCE(?6, error_message),
                 current_stage = CASE WHEN ?5 THEN current_stage ELSE COALESCE(?7, current_stage) END
             WHERE id = ?1 AND status = ?2",
            params![
                id,
                change.from,
                change.to,
                change.at,
                change.completed,
                if change.to == "error" { change.message } else { None },
                change.stage,
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        insert_event(tx, id, change.to, change.stage, change.message, change.at)?;
        Ok(true)
    })
}

/// Marks the stage a running request is in and logs the stage start.
pub fn set_current_stage(
    db: &Database,
    id: &str,
    stage: &str,
    at: &str,
) -> Result<(), DatabaseError> {
    db.with_transaction(|tx| {
        tx.execute(
            "UPDATE requests SET current_stage = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, stage, at],
        )?;
        let status: String =
            tx.query_row("SELECT status FROM requests WHERE id = ?1", params![id], |r| {
                r.get(0)
            })?;
        insert_event(tx, id, &status, Some(stage), Some("stage started"), at)?;
        Ok(())
    })
}

/// Stores the last prompt/response pair. Callers truncate beforehand.
pub fn record_transcript(
    db: &Database,
    id: &str,
    prompt: &str,
    response: &str,
    at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE requests SET last_prompt = ?2, last_response = ?3, updated_at = ?4
             WHERE id = ?1",
            params![id, prompt, response, at],
        )?;
        Ok(())
    })
}

/// Returns the status log of a request in insertion order.
pub fn events(db: &Database, id: &str) -> Result<Vec<EventRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT request_id, status, stage, message, created_at
             FROM request_events WHERE request_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(EventRow {
                    request_id: row.get(0)?,
                    status: row.get(1)?,
                    stage: row.get(2)?,
                    message: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

fn insert_event(
    conn: &Connection,
    id: &str,
    status: &str,
    stage: Option<&str>,
    message: Option<&str>,
    at: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO request_events (request_id, status, stage, message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, status, stage, message, at],
    )?;
    Ok(())
}
