//! Operation resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming traffic (url, method, headers)
//!     → request.rs (ValidationRequest: provider, api-version, method, path, query)
//!     → cache.rs (provider → api-version → method narrowing)
//!     → matcher.rs (compiled path regex per candidate)
//!     → Return: OperationMatch or ResolveError
//!
//! Path Compilation (at spec load):
//!     host template + basePath + path template
//!     → escape literals, capture parameter tokens
//!     → anchored case-insensitive regex
//! ```
//!
//! # Design Decisions
//! - Cache compiled at initialization, read-only at runtime
//! - Deterministic: same input always resolves to the same operation
//! - Query-constrained templates win over plain ones, which win over
//!   templates whose first parameter spans several segments

pub mod cache;
pub mod error;
pub mod matcher;
pub mod request;

pub use cache::{OperationMatch, SpecCache};
pub use error::{CandidateInfo, RequestParseError, ResolveError};
pub use matcher::{CompiledPath, PathMatcher, PathTemplateError, QueryConstraint};
pub use request::{parse_validation_request, ValidationRequest};
