//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stderr, pretty or JSON)
//!     → Whatever metrics recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Structured logging with correlation ids on every validation event
//! - Metrics go through the `metrics` facade, a no-op until a recorder is installed
//! - The library never installs a recorder or exporter itself

pub mod logging;
pub mod metrics;
