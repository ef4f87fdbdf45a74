//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ValidatorConfig (validated, immutable)
//!     → handed to LiveValidator at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::DataPlaneHint;
pub use schema::ObservabilityConfig;
pub use schema::RoundTripConfig;
pub use schema::SpecSourceConfig;
pub use schema::ValidationConfig;
pub use schema::ValidatorConfig;
