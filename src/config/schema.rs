//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the validator.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the live validator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Where the spec corpus comes from.
    pub specs: SpecSourceConfig,

    /// Validator compilation and validation policy.
    pub validation: ValidationConfig,

    /// Round-trip consistency checking.
    pub round_trip: RoundTripConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Host hints for data-plane requests that carry no provider segment.
    pub data_plane: Vec<DataPlaneHint>,
}

/// Spec corpus discovery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpecSourceConfig {
    /// Explicit spec files. When non-empty the directory scan is skipped.
    pub paths: Vec<String>,

    /// Root directory scanned recursively for `*.json` specs.
    pub directory: String,

    /// Substrings that exclude a scanned file.
    pub excluded_patterns: Vec<String>,

    /// Number of spec files read concurrently during initialization.
    pub load_concurrency: usize,
}

impl Default for SpecSourceConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            directory: "./specification".to_string(),
            excluded_patterns: vec![
                "/examples/".to_string(),
                "/quickstart-templates/".to_string(),
                "/scenarios/".to_string(),
                "/restler/".to_string(),
                "/common-types/".to_string(),
            ],
            load_concurrency: 8,
        }
    }
}

/// Validation policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Compile every operation validator in a detached task after initialization.
    pub load_validator_in_background: bool,

    /// Compile every operation validator before initialization returns.
    pub load_validator_in_initialize: bool,

    /// Apply ARM policy (LRO checks, strict additional properties).
    pub is_arm_call: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            load_validator_in_background: true,
            load_validator_in_initialize: false,
            is_arm_call: false,
        }
    }
}

/// Round-trip consistency configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RoundTripConfig {
    /// Enable `validate_round_trip`.
    pub enabled: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format (pretty or json).
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Maps a data-plane host suffix onto a provider namespace.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataPlaneHint {
    /// Host suffix to match (e.g., ".vault.azure.net").
    pub host_suffix: String,

    /// Provider namespace used for requests to that host.
    pub provider: String,
}
