//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::LowerConfig;
use std::path::Path;

/// Loads and validates `<project_dir>/lowr.toml`.
pub fn load_config(project_dir: &Path) -> Result<LowerConfig, ConfigError> {
    let config_path = project_dir.join("lowr.toml");
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `lowr.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<LowerConfig, ConfigError> {
    let config: LowerConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks naming strings and that every skipped pass is one the pipeline would run.
fn validate_config(config: &LowerConfig) -> Result<(), ConfigError> {
    if config.naming.separator.is_empty() {
        return Err(ConfigError::ValidationError(
            "naming.separator must not be empty".to_string(),
        ));
    }
    if config.naming.fresh_prefix.is_empty() {
        return Err(ConfigError::ValidationError(
            "naming.fresh_prefix must not be empty".to_string(),
        ));
    }
    let pipeline = &config.pipeline;
    if let Some(passes) = &pipeline.passes {
        if passes.is_empty() {
            return Err(ConfigError::ValidationError(
                "pipeline.passes must list at least one pass".to_string(),
            ));
        }
    }
    for pass in &pipeline.skip {
        let listed = match &pipeline.passes {
            Some(passes) => passes.contains(pass),
            None => pipeline.backend.default_passes().contains(pass),
        };
        if !listed {
            return Err(ConfigError::ValidationError(format!(
                "pass `{pass}` is not part of the `{}` pipeline",
                pipeline.backend
            )));
        }
    }
    Ok(())
}
