//! Live traffic validation against Swagger API specifications.
//!
//! Captured request/response pairs are resolved to the operation that
//! declares them, then checked against that operation's parameters,
//! responses, content types and long-running-operation rules. A round-trip
//! checker compares what a client sent with what the service echoed back.

// Spec corpus
pub mod config;
pub mod spec;

// Resolution and validation
pub mod live;
pub mod pointer;
pub mod roundtrip;
pub mod routing;
pub mod validation;

// Cross-cutting concerns
pub mod observability;

pub use config::schema::ValidatorConfig;
pub use live::{LiveRequest, LiveResponse, LiveValidator, RequestResponsePair, ValidateOptions};
pub use validation::{LiveValidationIssue, LiveValidationResult, RequestResponseValidationResult};
