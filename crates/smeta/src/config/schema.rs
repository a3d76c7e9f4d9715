use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub catalogs: CatalogConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding request records. Defaults to the platform data dir.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_results_directory")]
    pub results_directory: String,
    #[serde(default = "default_scratch_directory")]
    pub scratch_directory: String,
}

fn default_results_directory() -> String {
    std::env::temp_dir()
        .join("smeta")
        .join("results")
        .to_string_lossy()
        .into_owned()
}

fn default_scratch_directory() -> String {
    std::env::temp_dir()
        .join("smeta")
        .join("scratch")
        .to_string_lossy()
        .into_owned()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            results_directory: default_results_directory(),
            scratch_directory: default_scratch_directory(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(crate::db::default_database_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Inline key. Prefer `api_key_file` or `api_key_env` outside development.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Deadline for a whole generation call, body included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub token_budgets: TokenBudgets,
}

fn default_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_model() -> String {
    "claude-opus-4-5".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_api_key_env() -> Option<String> {
    Some("CLAUDE_API_KEY".to_string())
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_version: default_api_version(),
            temperature: default_temperature(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            token_budgets: TokenBudgets::default(),
        }
    }
}

/// Per-stage `max_tokens` passed to the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudgets {
    #[serde(default = "default_list_budget")]
    pub list: u32,
    #[serde(default = "default_estimate_budget")]
    pub estimate: u32,
    #[serde(default = "default_comparison_budget")]
    pub comparison: u32,
}

fn default_list_budget() -> u32 {
    8000
}

fn default_estimate_budget() -> u32 {
    8000
}

fn default_comparison_budget() -> u32 {
    4000
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            list: default_list_budget(),
            estimate: default_estimate_budget(),
            comparison: default_comparison_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_works_path")]
    pub works_path: String,
    #[serde(default = "default_materials_path")]
    pub materials_path: String,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_works_path() -> String {
    "pricelists/price_works.xlsx".to_string()
}

fn default_materials_path() -> String {
    "pricelists/price_materials.xlsx".to_string()
}

fn default_max_rows() -> usize {
    100
}

fn default_max_chars() -> usize {
    3000
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            works_path: default_works_path(),
            materials_path: default_materials_path(),
            max_rows: default_max_rows(),
            max_chars: default_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_transcript_limit")]
    pub transcript_limit: usize,
    #[serde(default = "default_document_excerpt_chars")]
    pub document_excerpt_chars: usize,
    #[serde(default = "default_comparison_excerpt_chars")]
    pub comparison_excerpt_chars: usize,
    #[serde(default = "default_vat_rate")]
    pub vat_rate: f64,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_transcript_limit() -> usize {
    5000
}

fn default_document_excerpt_chars() -> usize {
    2000
}

fn default_comparison_excerpt_chars() -> usize {
    2000
}

fn default_vat_rate() -> f64 {
    0.22
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            transcript_limit: default_transcript_limit(),
            document_excerpt_chars: default_document_excerpt_chars(),
            comparison_excerpt_chars: default_comparison_excerpt_chars(),
            vat_rate: default_vat_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_history_limit() -> usize {
    50
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            history_limit: default_history_limit(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_origins: Vec::new(),
        }
    }
}
