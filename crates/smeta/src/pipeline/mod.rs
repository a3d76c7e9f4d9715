pub mod config;
pub mod context;
pub mod error;
pub mod runner;
pub mod stage;

pub use config::PipelineConfig;
pub use context::{is_project_document, PipelineContext};
pub use error::{PipelineError, StageError};
pub use runner::Pipeline;
pub use stage::{plan, PlanError, PlannedStage, Stage, StageOutput, StagePlan, UnknownStage};
