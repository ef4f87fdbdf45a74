//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (concurrency > 0)
//! - Detect conflicting compilation modes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ValidatorConfig → Result<(), Vec<ConfigValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::ValidatorConfig;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Dotted config key the problem refers to.
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

fn error(field: &str, message: impl Into<String>) -> ConfigValidationError {
    ConfigValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Check a parsed configuration for semantic problems.
pub fn validate_config(config: &ValidatorConfig) -> Result<(), Vec<ConfigValidationError>> {
    let mut errors = Vec::new();

    if config.specs.load_concurrency == 0 {
        errors.push(error("specs.load_concurrency", "must be greater than 0"));
    }

    if config.specs.paths.is_empty() && config.specs.directory.trim().is_empty() {
        errors.push(error(
            "specs.directory",
            "either specs.paths or specs.directory must be set",
        ));
    }

    if config.validation.load_validator_in_background
        && config.validation.load_validator_in_initialize
    {
        errors.push(error(
            "validation.load_validator_in_background",
            "cannot be combined with load_validator_in_initialize",
        ));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(error(
            "observability.log_format",
            format!("expected 'pretty' or 'json', got '{}'", other),
        )),
    }

    for (i, hint) in config.data_plane.iter().enumerate() {
        if hint.host_suffix.trim().is_empty() {
            errors.push(error(
                &format!("data_plane[{}].host_suffix", i),
                "must not be empty",
            ));
        }
        if hint.provider.trim().is_empty() {
            errors.push(error(
                &format!("data_plane[{}].provider", i),
                "must not be empty",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
