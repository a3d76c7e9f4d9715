pub mod artifacts;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod generation;
pub mod intake;
pub mod pipeline;
pub mod processor;
pub mod results;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod store;
pub mod worker;

pub use artifacts::{ArtifactKind, RenderError};
pub use catalog::{seed_sample_catalogs, SeedReport};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, ProcessError, Result, SmetaError, StorageError, WorkerError};
pub use generation::{GenerationClient, GenerationError, MessagesClient};
pub use intake::{parse_requested_outputs, Accepted, Intake, IntakeError, Submission, UploadedFile};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, Stage};
pub use secrets::{resolve_secret, SecretError};
pub use storage::{FileStorage, ScratchSpace};
pub use store::{ArtifactRef, RequestQuery, RequestStatus, RequestStore};
pub use worker::{Job, JobQueue, JobResult, WorkerPool};
