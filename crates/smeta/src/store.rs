//! Request record store: lifecycle transitions, transcripts and artifact
//! references on top of the SQLite repositories.
//!
//! Every status change goes through a compare-and-set in
//! [`request_repo::transition`], so the observable sequence per request is
//! always `pending → processing → success | error` and is mirrored in the
//! `request_events` log.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::ArtifactKind;
use crate::db::artifact_repo::{self, ArtifactRow};
use crate::db::request_repo::{self, CreatedRange, RequestRow, StatusChange};
use crate::db::{Database, DatabaseError};
use crate::pipeline::Stage;
use crate::sanitize::truncate_chars;

pub const INTERRUPTED_MESSAGE: &str = "Processing interrupted by service restart";
pub const NOT_STARTED_MESSAGE: &str = "Request was not started before service shutdown";

const DEFAULT_TRANSCRIPT_LIMIT: usize = 5000;

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 1000;

// ─── Helpers ────────────────────────────────────────────────────────────────

fn now() -> String {
    format_timestamp(Utc::now())
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

// ─── Public types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Processing,
    Success,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DatabaseError> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "processing" => Ok(RequestStatus::Processing),
            "success" => Ok(RequestStatus::Success),
            "error" => Ok(RequestStatus::Error),
            other => Err(DatabaseError::InvalidColumn {
                column: "status",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Success | RequestStatus::Error)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uploaded file as recorded on the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub name: String,
    pub size: u64,
    pub content_kind: String,
}

/// Everything needed to create a request record.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub input_type: String,
    pub inputs: Vec<InputDescriptor>,
    pub outputs: BTreeSet<Stage>,
    pub annotation: Option<String>,
}

/// Handle to a stored artifact as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub artifact_id: String,
    pub file_name: String,
    pub kind: ArtifactKind,
}

/// Poll view of a request. Transcripts are deliberately absent.
#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    pub request_id: String,
    pub status: RequestStatus,
    pub input_type: String,
    pub inputs: Vec<InputDescriptor>,
    pub requested_outputs: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    pub outputs: BTreeMap<Stage, ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Summary row of the history listing.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub request_id: String,
    pub created_at: DateTime<Utc>,
    pub input_type: String,
    pub requested_outputs: Vec<Stage>,
    pub status: RequestStatus,
    pub outputs: BTreeMap<Stage, ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Artifact record with the location of its blob.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    pub id: String,
    pub request_id: String,
    pub stage: String,
    pub kind: String,
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// One entry of a request's audit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEvent {
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Paging and date window for [`RequestStore::list_requests`]. Both dates
/// are inclusive calendar days in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestQuery {
    pub skip: usize,
    pub limit: usize,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Default for RequestQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
            date_from: None,
            date_to: None,
        }
    }
}

impl RequestQuery {
    fn created_range(&self) -> CreatedRange {
        CreatedRange {
            from: self.date_from.map(|d| d.to_string()),
            before: self
                .date_to
                .and_then(|d| d.succ_opt())
                .map(|d| d.to_string()),
        }
    }
}

/// One page of requests plus the size of the whole filtered set.
#[derive(Debug, Clone, Serialize)]
pub struct RequestPage {
    pub total: u64,
    pub skip: usize,
    pub limit: usize,
    pub requests: Vec<RequestView>,
}

/// Operator view of a request: the poll view plus the stored transcript.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub view: RequestView,
    pub last_prompt: Option<String>,
    pub last_response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestStats {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub pending: u64,
    pub processing: u64,
    /// Percent of all requests that succeeded, two decimals.
    pub success_rate: f64,
    pub input_types_distribution: BTreeMap<String, u64>,
}

/// Counts from [`RequestStore::reconcile_interrupted`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Requests that were `processing` when the previous process stopped.
    pub interrupted: usize,
    /// Requests that never left `pending`.
    pub abandoned: usize,
}

// ─── RequestStore ───────────────────────────────────────────────────────────

/// Cheap to clone; intake, workers and the HTTP layer each hold one.
#[derive(Clone)]
pub struct RequestStore {
    db: Database,
    transcript_limit: usize,
}

impl RequestStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            transcript_limit: DEFAULT_TRANSCRIPT_LIMIT,
        }
    }

    /// Max characters kept of each of prompt and response.
    pub fn with_transcript_limit(mut self, limit: usize) -> Self {
        self.transcript_limit = limit;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates a `pending` record and returns its new identifier.
    pub fn create_pending(&self, request: &NewRequest) -> Result<String, DatabaseError> {
        let id = uuid::Uuid::new_v4().to_string();
        let at = now();
        let outputs: Vec<Stage> = request.outputs.iter().copied().collect();

        let row = RequestRow {
            id: id.clone(),
            created_at: at.clone(),
            updated_at: at,
            completed_at: None,
            input_type: request.input_type.clone(),
            input_files: serde_json::to_string(&request.inputs)?,
            requested_outputs: serde_json::to_string(&outputs)?,
            annotation: request.annotation.clone(),
            status: RequestStatus::Pending.as_str().to_string(),
            current_stage: None,
            last_prompt: None,
            last_response: None,
            error_message: None,
        };
        request_repo::insert(&self.db, &row)?;

        log::debug!("Created request {}", id);
        Ok(id)
    }

    /// Removes a request whose intake could not be completed.
    pub fn discard(&self, id: &str) -> Result<bool, DatabaseError> {
        request_repo::delete(&self.db, id)
    }

    /// `pending → processing`. Returns `false` when the request is missing
    /// or was already claimed.
    pub fn begin_processing(&self, id: &str) -> Result<bool, DatabaseError> {
        self.transition(id, RequestStatus::Pending, RequestStatus::Processing, None, None)
    }

    pub fn set_current_stage(&self, id: &str, stage: &str) -> Result<(), DatabaseError> {
        request_repo::set_current_stage(&self.db, id, stage, &now())
    }

    /// Keeps the latest prompt/response pair, each cut to the transcript limit.
    pub fn record_transcript(
        &self,
        id: &str,
        prompt: &str,
        response: &str,
    ) -> Result<(), DatabaseError> {
        request_repo::record_transcript(
            &self.db,
            id,
            truncate_chars(prompt, self.transcript_limit),
            truncate_chars(response, self.transcript_limit),
            &now(),
        )
    }

    /// Registers a stored blob as an artifact of `request_id`.
    pub fn add_artifact(
        &self,
        request_id: &str,
        stage: Stage,
        kind: ArtifactKind,
        path: &Path,
        size_bytes: u64,
    ) -> Result<ArtifactRef, DatabaseError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let row = ArtifactRow {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            stage: stage.as_str().to_string(),
            kind: kind.as_str().to_string(),
            file_name: file_name.clone(),
            file_path: path.to_string_lossy().into_owned(),
            size_bytes: i64::try_from(size_bytes).unwrap_or(i64::MAX),
            created_at: now(),
        };
        artifact_repo::insert(&self.db, &row)?;

        Ok(ArtifactRef {
            artifact_id: row.id,
            file_name,
            kind,
        })
    }

    pub fn complete_success(&self, id: &str) -> Result<bool, DatabaseError> {
        self.transition(
            id,
            RequestStatus::Processing,
            RequestStatus::Success,
            None,
            None,
        )
    }

    /// `processing → error`, keeping `message` on the record.
    pub fn complete_error(
        &self,
        id: &str,
        stage: Option<&str>,
        message: &str,
    ) -> Result<bool, DatabaseError> {
        self.transition(
            id,
            RequestStatus::Processing,
            RequestStatus::Error,
            stage,
            Some(message),
        )
    }

    pub fn status(&self, id: &str) -> Result<Option<RequestView>, DatabaseError> {
        request_repo::find_by_id(&self.db, id)?
            .map(|row| self.view(row))
            .transpose()
    }

    /// Status view together with the last prompt and response.
    pub fn detail(&self, id: &str) -> Result<Option<RequestDetail>, DatabaseError> {
        let Some(mut row) = request_repo::find_by_id(&self.db, id)? else {
            return Ok(None);
        };
        let last_prompt = row.last_prompt.take();
        let last_response = row.last_response.take();
        Ok(Some(RequestDetail {
            view: self.view(row)?,
            last_prompt,
            last_response,
        }))
    }

    /// Newest first within the query's date window. `limit` is capped at
    /// [`MAX_PAGE_LIMIT`].
    pub fn list_requests(&self, query: &RequestQuery) -> Result<RequestPage, DatabaseError> {
        let range = query.created_range();
        let limit = query.limit.min(MAX_PAGE_LIMIT);
        let requests = request_repo::page(&self.db, &range, query.skip, Some(limit))?
            .into_iter()
            .map(|row| self.view(row))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RequestPage {
            total: request_repo::count(&self.db, &range)?,
            skip: query.skip,
            limit,
            requests,
        })
    }

    /// Every request, newest first.
    pub fn all_requests(&self) -> Result<Vec<RequestView>, DatabaseError> {
        request_repo::page(&self.db, &CreatedRange::default(), 0, None)?
            .into_iter()
            .map(|row| self.view(row))
            .collect()
    }

    pub fn stats(&self) -> Result<RequestStats, DatabaseError> {
        let count = |status: RequestStatus| request_repo::count_by_status(&self.db, status.as_str());

        let total_requests = request_repo::count(&self.db, &CreatedRange::default())?;
        let successful = count(RequestStatus::Success)?;
        let success_rate = if total_requests == 0 {
            0.0
        } else {
            (10_000.0 * successful as f64 / total_requests as f64).round() / 100.0
        };

        Ok(RequestStats {
            total_requests,
            successful,
            failed: count(RequestStatus::Error)?,
            pending: count(RequestStatus::Pending)?,
            processing: count(RequestStatus::Processing)?,
            success_rate,
            input_types_distribution: request_repo::count_by_input_type(&self.db)?
                .into_iter()
                .collect(),
        })
    }

    /// Newest `limit` requests first.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, DatabaseError> {
        request_repo::recent(&self.db, limit)?
            .into_iter()
            .map(|row| {
                Ok(HistoryEntry {
                    outputs: self.output_refs(&row.id)?,
                    status: RequestStatus::parse(&row.status)?,
                    requested_outputs: serde_json::from_str(&row.requested_outputs)?,
                    created_at: parse_timestamp(&row.created_at),
                    request_id: row.id,
                    input_type: row.input_type,
                    error_message: row.error_message,
                })
            })
            .collect()
    }

    pub fn artifact(&self, id: &str) -> Result<Option<StoredArtifact>, DatabaseError> {
        Ok(artifact_repo::find_by_id(&self.db, id)?.map(StoredArtifact::from))
    }

    /// The artifact stored under `file_name`. `None` when no artifact, or
    /// more than one, carries that name.
    pub fn artifact_by_name(&self, file_name: &str) -> Result<Option<StoredArtifact>, DatabaseError> {
        Ok(artifact_repo::find_by_name(&self.db, file_name)?.map(StoredArtifact::from))
    }

    pub fn events(&self, id: &str) -> Result<Vec<RequestEvent>, DatabaseError> {
        request_repo::events(&self.db, id)?
            .into_iter()
            .map(|e| {
                Ok(RequestEvent {
                    status: RequestStatus::parse(&e.status)?,
                    stage: e.stage,
                    message: e.message,
                    created_at: parse_timestamp(&e.created_at),
                })
            })
            .collect()
    }

    /// Moves every request left non-terminal by a previous process to
    /// `error`, through `processing` for those never claimed. Must run
    /// before any worker starts.
    pub fn reconcile_interrupted(&self) -> Result<ReconcileReport, DatabaseError> {
        let mut report = ReconcileReport::default();

        for id in request_repo::ids_with_status(&self.db, RequestStatus::Processing.as_str())? {
            if self.complete_error(&id, None, INTERRUPTED_MESSAGE)? {
                report.interrupted += 1;
            }
        }

        // Claimed first, so the log still reads pending, processing, error.
        for id in request_repo::ids_with_status(&self.db, RequestStatus::Pending.as_str())? {
            if self.begin_processing(&id)? && self.complete_error(&id, None, NOT_STARTED_MESSAGE)? {
                report.abandoned += 1;
            }
        }

        if report.interrupted + report.abandoned > 0 {
            log::warn!(
                "Reconciled {} interrupted and {} never-started requests",
                report.interrupted,
                report.abandoned
            );
        }
        Ok(report)
    }

    fn transition(
        &self,
        id: &str,
        from: RequestStatus,
        to: RequestStatus,
        stage: Option<&str>,
        message: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let at = now();
        let change = StatusChange {
            from: from.as_str(),
            to: to.as_str(),
            stage,
            message,
            completed: to.is_terminal(),
            at: &at,
        };
        let applied = request_repo::transition(&self.db, id, &change)?;
        if !applied {
            log::debug!("Request {}: {} -> {} not applied", id, from, to);
        }
        Ok(applied)
    }

    fn view(&self, row: RequestRow) -> Result<RequestView, DatabaseError> {
        Ok(RequestView {
            outputs: self.output_refs(&row.id)?,
            status: RequestStatus::parse(&row.status)?,
            inputs: serde_json::from_str(&row.input_files)?,
            requested_outputs: serde_json::from_str(&row.requested_outputs)?,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            completed_at: row.completed_at.as_deref().map(parse_timestamp),
            request_id: row.id,
            input_type: row.input_type,
            annotation: row.annotation,
            current_stage: row.current_stage,
            error_message: row.error_message,
        })
    }

    fn output_refs(&self, request_id: &str) -> Result<BTreeMap<Stage, ArtifactRef>, DatabaseError> {
        let mut refs = BTreeMap::new();
        for row in artifact_repo::list_for_request(&self.db, request_id)? {
            let (Ok(stage), Some(kind)) = (row.stage.parse::<Stage>(), ArtifactKind::parse(&row.kind))
            else {
                log::warn!(
                    "Skipping artifact {} with unknown stage '{}' or kind '{}'",
                    row.id,
                    row.stage,
                    row.kind
                );
                continue;
            };
            refs.insert(
                stage,
                ArtifactRef {
                    artifact_id: row.id,
                    file_name: row.file_name,
                    kind,
                },
            );
        }
        Ok(refs)
    }
}

impl From<ArtifactRow> for StoredArtifact {
    fn from(row: ArtifactRow) -> Self {
        Self {
            created_at: parse_timestamp(&row.created_at),
            size_bytes: u64::try_from(row.size_bytes).unwrap_or(0),
            path: PathBuf::from(row.file_path),
            id: row.id,
            request_id: row.request_id,
            stage: row.stage,
            kind: row.kind,
            file_name: row.file_name,
        }
    }
}
