use thiserror::Error;

use crate::artifacts::RenderError;
use crate::db::DatabaseError;
use crate::error::{ProcessError, StorageError};
use crate::generation::{ExtractError, GenerationError};

use super::stage::{PlanError, Stage};

/// Failure inside one stage. Wrapped in [`PipelineError::Stage`] so the
/// final message names the stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("malformed generation output: {0}")]
    MalformedOutput(#[from] ExtractError),

    #[error("missing project context: no project or specification document among the inputs")]
    MissingProjectContext,

    #[error("upstream {0} result is not available")]
    MissingUpstream(Stage),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("failed to build artifact: {0}")]
    ArtifactBuild(#[from] RenderError),

    #[error("failed to write artifact: {0}")]
    ArtifactWrite(#[from] StorageError),

    #[error("failed to update request record: {0}")]
    Record(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read input '{filename}': {source}")]
    Normalization {
        filename: String,
        #[source]
        source: ProcessError,
    },

    #[error("Request has no input documents")]
    NoDocuments,

    #[error("Invalid output selection: {0}")]
    Plan(#[from] PlanError),

    #[error("{} stage failed: {source}", stage.label())]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error("Request record error: {0}")]
    Record(#[from] DatabaseError),
}

impl PipelineError {
    /// Name recorded next to the error in the request's event log.
    pub fn stage_name(&self) -> Option<&'static str> {
        match self {
            PipelineError::Normalization { .. } | PipelineError::NoDocuments => Some("normalize"),
            PipelineError::Stage { stage, .. } => Some(stage.as_str()),
            PipelineError::Plan(_) | PipelineError::Record(_) => None,
        }
    }

    pub fn is_missing_project_context(&self) -> bool {
        matches!(
            self,
            PipelineError::Stage {
                source: StageError::MissingProjectContext,
                ..
            }
        )
    }
}
