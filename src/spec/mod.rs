//! Spec model and loading.
//!
//! # Data Flow
//! ```text
//! spec file (Swagger 2.0 JSON)
//!     → loader.rs (parse, resolve parameter/response refs, compile paths)
//!     → Spec { SpecInfo, Operation[] }
//!     → registered into the SpecCache
//! ```

pub mod loader;
pub mod types;

pub use loader::{parse_spec, JsonSpecLoader, LoadError, SpecLoader};
pub use types::{
    HttpMethod, Operation, Parameter, ParameterLocation, Response, Spec, SpecInfo,
    UNKNOWN_OPERATION_ID,
};
