//! Isolated environment for running whole pipeline requests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use smeta::config::{load_config_from_str, Config};
use smeta::pipeline::{Pipeline, PipelineConfig, Stage};
use smeta::storage::ScratchSpace;
use smeta::store::{InputDescriptor, NewRequest, RequestStore};
use smeta::{Database, Job, JobResult};

use super::ScriptedGenerator;

pub struct TestHarness {
    temp_dir: TempDir,
    pub results_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub config: Config,
    pub store: RequestStore,
    pub generator: Arc<ScriptedGenerator>,
    pipeline: Arc<Pipeline>,
}

impl TestHarness {
    /// Harness whose generation client answers from `generator`.
    pub fn new(generator: ScriptedGenerator) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let results_dir = base.join("results");
        let scratch_dir = base.join("scratch");

        let config = load_config_from_str(
            &json!({
                "version": "1.0",
                "storage": {
                    "results_directory": results_dir,
                    "scratch_directory": scratch_dir,
                },
                "catalogs": {
                    "works_path": base.join("pricelists/price_works.xlsx"),
                    "materials_path": base.join("pricelists/price_materials.xlsx"),
                },
                "pipeline": { "worker_count": 2, "transcript_limit": 200 },
            })
            .to_string(),
        )
        .expect("Harness config must be valid");

        let store = RequestStore::new(Database::open_in_memory().expect("in-memory database"))
            .with_transcript_limit(config.pipeline.transcript_limit);
        let generator = Arc::new(generator);
        let pipeline = Arc::new(Pipeline::from_config(
            Arc::new(PipelineConfig::from_config(&config)),
            generator.clone(),
            store.clone(),
        ));

        Self {
            temp_dir,
            results_dir,
            scratch_dir,
            config,
            store,
            generator,
            pipeline,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn scratch(&self) -> ScratchSpace {
        ScratchSpace::new(&self.scratch_dir)
    }

    /// Creates the pending record and stages `files`, as intake would.
    pub fn prepare(&self, files: &[(&str, &str)], outputs: &[Stage]) -> Job {
        let outputs: BTreeSet<Stage> = outputs.iter().copied().collect();
        let request_id = self
            .store
            .create_pending(&NewRequest {
                input_type: "project".to_string(),
                inputs: files
                    .iter()
                    .map(|(name, body)| InputDescriptor {
                        name: name.to_string(),
                        size: body.len() as u64,
                        content_kind: "text/plain".to_string(),
                    })
                    .collect(),
                outputs: outputs.clone(),
                annotation: None,
            })
            .expect("Failed to create request");
        let inputs = self
            .scratch()
            .stage(&request_id, files.iter().map(|(n, b)| (*n, b.as_bytes())))
            .expect("Failed to stage inputs");

        Job::new(request_id, inputs, outputs, None)
    }

    /// Runs one request to completion on the calling thread.
    pub fn run(&self, files: &[(&str, &str)], outputs: &[Stage]) -> JobResult {
        let job = self.prepare(files, outputs);
        self.pipeline.run(job)
    }

    /// Bytes of the artifact `result` produced for `stage`.
    pub fn artifact_bytes(&self, result: &JobResult, stage: Stage) -> Vec<u8> {
        let reference = result
            .artifacts
            .get(&stage)
            .unwrap_or_else(|| panic!("no {stage} artifact in {:?}", result.artifacts));
        let stored = self
            .store
            .artifact(&reference.artifact_id)
            .expect("artifact lookup")
            .expect("artifact row");
        std::fs::read(&stored.path).expect("artifact blob")
    }
}
