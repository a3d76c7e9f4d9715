use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let budgets = &config.generation.token_budgets;
    if budgets.list == 0 || budgets.estimate == 0 || budgets.comparison == 0 {
        return Err(ConfigError::Validation {
            message: "Token budgets must be greater than zero".to_string(),
        });
    }

    if config.generation.request_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "generation.request_timeout_secs must be greater than zero".to_string(),
        });
    }

    if !(0.0..1.0).contains(&config.pipeline.vat_rate) {
        return Err(ConfigError::Validation {
            message: format!(
                "pipeline.vat_rate must be in [0, 1), got {}",
                config.pipeline.vat_rate
            ),
        });
    }

    if config.pipeline.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "pipeline.worker_count must be at least 1".to_string(),
        });
    }

    if config.server.history_limit == 0 {
        return Err(ConfigError::Validation {
            message: "server.history_limit must be at least 1".to_string(),
        });
    }

    Ok(())
}
