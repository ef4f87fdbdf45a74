//! Validation subsystem.
//!
//! # Data Flow
//! ```text
//! OperationMatch + LiveRequest/LiveResponse
//!     → schema.rs (memoized compiled validator per operation / response)
//!     → operation.rs (payload assembly, content type, schema run, issue remap)
//!     → lro.rs (ARM long-running initial response rules)
//!     → issue.rs (codes, severities, messages)
//!     → result.rs (Success | Failures | RuntimeException)
//! ```

pub mod issue;
pub mod lro;
pub mod operation;
pub mod result;
pub mod schema;

pub use issue::{error_meta, IssueCode, LiveValidationIssue, Severity, SourceLocation};
pub use operation::ValidationPolicy;
pub use result::{
    LiveValidationReport, LiveValidationResult, OperationContext, OperationInfo,
    RequestResponseReport, RequestResponseValidationResult, RuntimeException, ValidationOutcome,
};
pub use schema::{CompiledSchema, JsonSchemaValidator, SchemaError, SchemaIssue, SchemaValidator};
