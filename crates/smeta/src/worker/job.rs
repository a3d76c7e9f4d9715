use std::collections::{BTreeMap, BTreeSet};

use crate::pipeline::Stage;
use crate::storage::ScratchInputs;
use crate::store::ArtifactRef;

/// One queued pipeline run.
///
/// Owns the request's scratch inputs: dropping the job (after the run, or
/// unprocessed at shutdown) removes them.
#[derive(Debug)]
pub struct Job {
    pub request_id: String,
    pub inputs: ScratchInputs,
    /// Stages the client asked for; dependencies are added by the planner.
    pub outputs: BTreeSet<Stage>,
    pub annotation: Option<String>,
}

impl Job {
    pub fn new(
        request_id: impl Into<String>,
        inputs: ScratchInputs,
        outputs: BTreeSet<Stage>,
        annotation: Option<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            inputs,
            outputs,
            annotation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub request_id: String,
    pub success: bool,
    /// True when the record was not pending, so nothing ran.
    pub skipped: bool,
    /// Artifacts written by this run, including those of a run that failed
    /// at a later stage.
    pub artifacts: BTreeMap<Stage, ArtifactRef>,
    pub error: Option<String>,
    /// Set when the outcome could not be written to the request record,
    /// which then stays non-terminal until startup reconciliation.
    pub record_error: Option<String>,
}

impl JobResult {
    pub fn success(request_id: &str, artifacts: BTreeMap<Stage, ArtifactRef>) -> Self {
        Self {
            request_id: request_id.to_string(),
            success: true,
            skipped: false,
            artifacts,
            error: None,
            record_error: None,
        }
    }

    pub fn failure(
        request_id: &str,
        artifacts: BTreeMap<Stage, ArtifactRef>,
        error: String,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            success: false,
            skipped: false,
            artifacts,
            error: Some(error),
            record_error: None,
        }
    }

    pub fn with_record_error(mut self, error: impl ToString) -> Self {
        self.record_error = Some(error.to_string());
        self
    }

    pub fn skipped(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            success: false,
            skipped: true,
            artifacts: BTreeMap::new(),
            error: None,
            record_error: None,
        }
    }
}
