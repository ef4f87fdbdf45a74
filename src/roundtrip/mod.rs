//! Round-trip consistency checking.
//!
//! # Responsibilities
//! - Diff a request body against the response body of the same operation
//! - Classify each difference against the schema's `readOnly`, `x-ms-secret`,
//!   `default` and `x-ms-mutability` declarations
//!
//! # Data Flow
//! ```text
//! (request body, response body)
//!     → diff (add / remove / replace)
//!     → AttributeCache (per provider, api-version, operation id)
//!     → check_round_trip → ROUNDTRIP_* issues
//! ```

pub mod attributes;
pub mod checker;
pub mod diff;

pub use attributes::{AttributeCache, AttributeKey, AttributeKind, Direction, OperationAttributes};
pub use checker::check_round_trip;
pub use diff::{diff, PatchOperation};
