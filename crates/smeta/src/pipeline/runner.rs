use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

use crate::artifacts;
use crate::catalog::PriceCatalogs;
use crate::db::DatabaseError;
use crate::generation::{parse_json, prompts, GenerationClient};
use crate::processor::ProcessorRegistry;
use crate::results::{ComparisonReport, EstimateItem, LineItem};
use crate::sanitize;
use crate::storage::FileStorage;
use crate::store::RequestStore;
use crate::worker::job::{Job, JobResult};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, StageError};
use super::stage::{self, PlannedStage, Stage, StageOutput, StagePlan};

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    client: Arc<dyn GenerationClient>,
    processor: ProcessorRegistry,
    store: RequestStore,
    storage: FileStorage,
    catalogs: PriceCatalogs,
}

impl Pipeline {
    /// Builds the sub-components from config; the generation client and the
    /// record store are shared with the rest of the process.
    pub fn from_config(
        config: Arc<PipelineConfig>,
        client: Arc<dyn GenerationClient>,
        store: RequestStore,
    ) -> Self {
        let processor = ProcessorRegistry::new();
        let storage = FileStorage::new(&config.results_directory);
        let catalogs = PriceCatalogs::from_config(&config.catalogs);

        Self {
            config,
            client,
            processor,
            store,
            storage,
            catalogs,
        }
    }

    pub fn store(&self) -> &RequestStore {
        &self.store
    }

    /// Runs every planned stage of one request and records the outcome.
    ///
    /// Never panics on a failed stage: the error becomes the request's
    /// terminal `error` status and is returned in the [`JobResult`].
    pub fn run(&self, job: Job) -> JobResult {
        let _pipeline_span = info_span!("pipeline",
            request_id = %job.request_id,
            outputs = ?job.outputs,
            files = job.inputs.files().len(),
        )
        .entered();

        match retry_once("claim request", || self.store.begin_processing(&job.request_id)) {
            Ok(true) => {}
            Ok(false) => {
                warn!("Request is not pending, skipping run");
                return JobResult::skipped(&job.request_id);
            }
            Err(e) => {
                error!("Failed to claim request: {}", e);
                return JobResult::failure(&job.request_id, Default::default(), e.to_string())
                    .with_record_error(e);
            }
        }

        let mut ctx = PipelineContext::new(job);
        let outcome = self.execute(&mut ctx);
        self.finish(ctx, outcome)
    }

    /// Writes the terminal status, retrying once. A success that cannot be
    /// written falls back to `error`, so the record is not left `processing`.
    fn finish(&self, ctx: PipelineContext, outcome: Result<(), PipelineError>) -> JobResult {
        let request_id = ctx.request_id().to_string();

        let (message, stage) = match outcome {
            Ok(()) => {
                match retry_once("record success", || self.store.complete_success(&request_id)) {
                    Ok(_) => {
                        info!(artifacts = ctx.artifacts.len(), "Request completed");
                        return JobResult::success(&request_id, ctx.artifacts);
                    }
                    Err(e) => {
                        error!("Failed to mark request successful: {}", e);
                        (format!("Failed to record success: {}", e), None)
                    }
                }
            }
            Err(e) => {
                if e.is_missing_project_context() {
                    warn!(stage = e.stage_name().unwrap_or("-"), "{}", e);
                } else {
                    error!(stage = e.stage_name().unwrap_or("-"), "{}", e);
                }
                (e.to_string(), e.stage_name())
            }
        };

        let recorded = retry_once("record error", || {
            self.store.complete_error(&request_id, stage, &message)
        });
        let result = JobResult::failure(&request_id, ctx.artifacts, message);
        match recorded {
            Ok(_) => result,
            Err(db) => {
                error!("Failed to record request error: {}", db);
                result.with_record_error(db)
            }
        }
    }

    fn execute(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let plan = stage::plan(&ctx.job.outputs)?;
        debug!(plan = ?plan.stages().collect::<Vec<_>>(), "Planned stages");

        {
            let _step = info_span!("normalize").entered();
            self.step_normalize(ctx)?;
        }

        self.check_comparison_context(ctx, &plan)?;

        for planned in plan.steps() {
            let _step = info_span!("stage", name = %planned.stage, emit = planned.emit).entered();
            self.run_stage(ctx, planned)
                .map_err(|source| PipelineError::Stage {
                    stage: planned.stage,
                    source,
                })?;
        }

        Ok(())
    }

    /// Fails a Comparison run before any generation call when no input is
    /// project material and no other stage of the plan is kept as an
    /// artifact. Otherwise Comparison fails in turn, after those stages.
    fn check_comparison_context(
        &self,
        ctx: &PipelineContext,
        plan: &StagePlan,
    ) -> Result<(), PipelineError> {
        if !plan.contains(Stage::Comparison)
            || ctx.has_project_document(self.config.comparison_excerpt_chars)
        {
            return Ok(());
        }

        let emits_other = plan
            .steps()
            .iter()
            .any(|s| s.emit && s.stage != Stage::Comparison);
        if emits_other {
            return Ok(());
        }

        Err(PipelineError::Stage {
            stage: Stage::Comparison,
            source: StageError::MissingProjectContext,
        })
    }

    fn step_normalize(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if ctx.job.inputs.files().is_empty() {
            return Err(PipelineError::NoDocuments);
        }

        for staged in ctx.job.inputs.files() {
            let _file = info_span!("normalize_file",
                file = %sanitize::redact_path(&staged.path),
            )
            .entered();

            let mut document =
                self.processor
                    .process(&staged.path)
                    .map_err(|source| PipelineError::Normalization {
                        filename: staged.original_name.clone(),
                        source,
                    })?;
            document.filename = staged.original_name.clone();
            debug!(format = ?document.format, "Normalized");
            ctx.documents.push(document);
        }

        Ok(())
    }

    fn run_stage(&self, ctx: &mut PipelineContext, planned: &PlannedStage) -> Result<(), StageError> {
        self.store
            .set_current_stage(ctx.request_id(), planned.stage.as_str())?;

        let output = match planned.stage {
            Stage::List => self.stage_list(ctx)?,
            Stage::Estimate => self.stage_estimate(ctx)?,
            Stage::Comparison => self.stage_comparison(ctx)?,
        };

        if planned.emit {
            self.emit_artifact(ctx, &output)?;
        }
        ctx.outputs.insert(planned.stage, output);
        Ok(())
    }

    fn stage_list(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let prompt = prompts::list_prompt(
            &ctx.documents,
            ctx.job.annotation.as_deref(),
            self.config.document_excerpt_chars,
        );
        let response = self.generate(ctx, Stage::List, &prompt)?;
        let items: Vec<LineItem> = parse_json(&response)?;
        debug!(items = items.len(), "Parsed list");
        Ok(StageOutput::Items(items))
    }

    fn stage_estimate(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let Some(StageOutput::Items(items)) = ctx.outputs.get(&Stage::List) else {
            return Err(StageError::MissingUpstream(Stage::List));
        };

        let prompt = prompts::estimate_prompt(
            items,
            &self.catalogs.works(),
            &self.catalogs.materials(),
            self.config.vat_rate,
        );
        let response = self.generate(ctx, Stage::Estimate, &prompt)?;
        let priced: Vec<EstimateItem> = parse_json(&response)?;
        debug!(items = priced.len(), "Parsed estimate");
        Ok(StageOutput::Estimate(priced))
    }

    fn stage_comparison(&self, ctx: &PipelineContext) -> Result<StageOutput, StageError> {
        let excerpt_chars = self.config.comparison_excerpt_chars;
        if !ctx.has_project_document(excerpt_chars) {
            return Err(StageError::MissingProjectContext);
        }

        let upstream = ctx
            .outputs
            .get(&Stage::Estimate)
            .or_else(|| ctx.outputs.get(&Stage::List))
            .ok_or(StageError::MissingUpstream(Stage::List))?;

        let project = ctx
            .documents
            .iter()
            .map(|doc| format!("--- {} ---\n{}", doc.filename, doc.excerpt(excerpt_chars)))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt =
            prompts::comparison_prompt(&project, &upstream.to_prompt_json(), excerpt_chars);
        let response = self.generate(ctx, Stage::Comparison, &prompt)?;
        let report: ComparisonReport = parse_json(&response)?;
        debug!(compliance = ?report.compliance_pct, "Parsed comparison");
        Ok(StageOutput::Comparison(report))
    }

    /// One generation call, with the exchange written to the record before
    /// the response is parsed.
    fn generate(&self, ctx: &PipelineContext, stage: Stage, prompt: &str) -> Result<String, StageError> {
        let budget = stage.budget(&self.config.budgets);
        debug!(budget, prompt_chars = prompt.chars().count(), "Calling generation service");

        let response = self.client.generate(prompt, budget)?;
        self.store
            .record_transcript(ctx.request_id(), prompt, &response)?;
        Ok(response)
    }

    fn emit_artifact(&self, ctx: &mut PipelineContext, output: &StageOutput) -> Result<(), StageError> {
        let rendered =
            artifacts::render(output, ctx.request_id(), &ctx.date, self.config.vat_rate)?;
        let path = self
            .storage
            .store(&rendered.bytes, ctx.request_id(), &rendered.file_name)?;
        let reference = self.store.add_artifact(
            ctx.request_id(),
            output.stage(),
            rendered.kind,
            &path,
            rendered.bytes.len() as u64,
        )?;

        debug!(
            artifact_id = %reference.artifact_id,
            file = %sanitize::redact_path(&path),
            "Stored artifact"
        );
        ctx.artifacts.insert(output.stage(), reference);
        Ok(())
    }
}

/// Runs a record write, and once more if the first attempt fails.
fn retry_once<T>(
    what: &str,
    mut write: impl FnMut() -> Result<T, DatabaseError>,
) -> Result<T, DatabaseError> {
    write().or_else(|e| {
        warn!("Failed to {}, retrying: {}", what, e);
        write()
    })
}
