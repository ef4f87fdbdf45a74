//! Live traffic validation.
//!
//! # Responsibilities
//! - Define the captured request/response shapes
//! - Own the spec cache and the validate entry points
//!
//! # Data Flow
//! ```text
//! spec corpus → LiveValidator::initialize → SpecCache
//! traffic     → LiveValidator::validate_* → LiveValidationResult
//! ```

pub mod traffic;
pub mod validator;

pub use traffic::{LiveRequest, LiveResponse, RequestResponsePair, StatusCodeValue};
pub use validator::{InitializeSummary, LiveValidator, ValidateOptions};
