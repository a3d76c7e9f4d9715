use std::path::PathBuf;

use crate::config::{CatalogConfig, Config, TokenBudgets};

/// Everything a pipeline run reads from configuration, resolved once at
/// startup and shared by all workers.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Artifacts land in `<results_directory>/<request_id>/`.
    pub results_directory: PathBuf,
    pub budgets: TokenBudgets,
    pub catalogs: CatalogConfig,
    pub document_excerpt_chars: usize,
    pub comparison_excerpt_chars: usize,
    pub vat_rate: f64,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            results_directory: PathBuf::from(&config.storage.results_directory),
            budgets: config.generation.token_budgets,
            catalogs: config.catalogs.clone(),
            document_excerpt_chars: config.pipeline.document_excerpt_chars,
            comparison_excerpt_chars: config.pipeline.comparison_excerpt_chars,
            vat_rate: config.pipeline.vat_rate,
        }
    }
}
