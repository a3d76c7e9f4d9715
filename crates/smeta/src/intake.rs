//! Synchronous request intake: validate, record, stage, enqueue.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{StorageError, WorkerError};
use crate::pipeline::{Stage, UnknownStage};
use crate::sanitize::sanitize_upload_name;
use crate::storage::ScratchSpace;
use crate::store::{InputDescriptor, NewRequest, RequestStatus, RequestStore};
use crate::worker::{Job, JobQueue};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("At least one file is required")]
    NoFiles,

    #[error("Invalid file name: '{0}'")]
    InvalidFileName(String),

    #[error("input_type must not be empty")]
    EmptyInputType,

    #[error("At least one output must be requested")]
    NoOutputs,

    #[error(transparent)]
    UnknownOutput(#[from] UnknownStage),

    #[error("Malformed requested_outputs: {0}")]
    MalformedOutputs(String),

    #[error("Failed to stage inputs: {0}")]
    Staging(#[from] StorageError),

    #[error("Failed to queue request: {0}")]
    Queue(#[from] WorkerError),

    #[error("Failed to record request: {0}")]
    Record(#[from] DatabaseError),
}

impl IntakeError {
    /// Whether the caller sent something invalid, as opposed to the service
    /// failing to accept a valid submission.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IntakeError::NoFiles
                | IntakeError::InvalidFileName(_)
                | IntakeError::EmptyInputType
                | IntakeError::NoOutputs
                | IntakeError::UnknownOutput(_)
                | IntakeError::MalformedOutputs(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// Content type sent by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub input_type: String,
    pub files: Vec<UploadedFile>,
    /// Raw selection: a JSON array of stage names or a comma-separated list.
    pub requested_outputs: String,
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Accepted {
    pub request_id: String,
    pub status: RequestStatus,
}

/// Parses a requested-output selection into a stage set.
///
/// Accepts `["list", "estimate"]` or `list, estimate`. Duplicates collapse;
/// unknown names and empty selections are rejected.
pub fn parse_requested_outputs(raw: &str) -> Result<BTreeSet<Stage>, IntakeError> {
    let raw = raw.trim();

    let names: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).map_err(|e| IntakeError::MalformedOutputs(e.to_string()))?
    } else {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    let stages = names
        .iter()
        .map(|name| name.parse::<Stage>())
        .collect::<Result<BTreeSet<_>, _>>()?;

    if stages.is_empty() {
        return Err(IntakeError::NoOutputs);
    }
    Ok(stages)
}

/// Accepts submissions and hands them to the worker pool.
#[derive(Clone)]
pub struct Intake {
    store: RequestStore,
    scratch: ScratchSpace,
    queue: JobQueue,
}

impl Intake {
    pub fn new(store: RequestStore, scratch: ScratchSpace, queue: JobQueue) -> Self {
        Self {
            store,
            scratch,
            queue,
        }
    }

    /// Creates the pending record, stages inputs and queues the run.
    ///
    /// On any failure after the record exists, the record is removed again
    /// so nothing is left pending without a job behind it.
    pub fn submit(&self, submission: Submission) -> Result<Accepted, IntakeError> {
        let validated = validate(submission)?;

        let request_id = self.store.create_pending(&validated.request)?;

        let staged = self.scratch.stage(
            &request_id,
            validated
                .files
                .iter()
                .map(|(name, file)| (name.as_str(), file.bytes.as_slice())),
        );
        let inputs = match staged {
            Ok(inputs) => inputs,
            Err(e) => {
                self.discard(&request_id);
                return Err(e.into());
            }
        };

        let job = Job::new(
            request_id.clone(),
            inputs,
            validated.request.outputs.clone(),
            validated.request.annotation.clone(),
        );
        if let Err(e) = self.queue.submit(job) {
            self.discard(&request_id);
            return Err(e.into());
        }

        log::info!(
            "Accepted request {} ({} files, outputs {:?})",
            request_id,
            validated.files.len(),
            validated.request.outputs
        );

        Ok(Accepted {
            request_id,
            status: RequestStatus::Pending,
        })
    }

    fn discard(&self, request_id: &str) {
        if let Err(e) = self.store.discard(request_id) {
            log::error!("Failed to discard request {}: {}", request_id, e);
        }
    }
}

struct Validated {
    request: NewRequest,
    files: Vec<(String, UploadedFile)>,
}

fn validate(submission: Submission) -> Result<Validated, IntakeError> {
    if submission.files.is_empty() {
        return Err(IntakeError::NoFiles);
    }

    let input_type = submission.input_type.trim();
    if input_type.is_empty() {
        return Err(IntakeError::EmptyInputType);
    }

    let outputs = parse_requested_outputs(&submission.requested_outputs)?;

    let mut files = Vec::with_capacity(submission.files.len());
    for file in submission.files {
        let name = sanitize_upload_name(&file.name)
            .ok_or_else(|| IntakeError::InvalidFileName(file.name.clone()))?;
        files.push((name, file));
    }

    let inputs = files
        .iter()
        .map(|(name, file)| InputDescriptor {
            name: name.clone(),
            size: file.bytes.len() as u64,
            content_kind: file
                .content_type
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| {
                    mime_guess::from_path(name)
                        .first_or_octet_stream()
                        .to_string()
                }),
        })
        .collect();

    let annotation = submission
        .annotation
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());

    Ok(Validated {
        request: NewRequest {
            input_type: input_type.to_string(),
            inputs,
            outputs,
            annotation,
        },
        files,
    })
}
