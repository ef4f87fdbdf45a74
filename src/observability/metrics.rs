//! Metrics collection.
//!
//! # Metrics
//! - `live_validator_validations_total` (counter): validations by kind and outcome
//! - `live_validator_validator_build_seconds` (histogram): on-demand/background compile time
//! - `live_validator_specs_loaded_total` (counter): spec files by load result
//! - `live_validator_cached_operations` (gauge): operations registered in the spec cache
//! - `live_validator_roundtrip_issues_total` (counter): round-trip violations by code
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Labels are low-cardinality (kind, outcome, mode, code); never operation ids

use std::time::Duration;

/// Record the outcome of a single validation call.
///
/// `kind` is one of `request`, `response`, `roundtrip`; `outcome` one of
/// `success`, `failure`, `runtime_exception`.
pub fn record_validation(kind: &'static str, outcome: &'static str) {
    metrics::counter!(
        "live_validator_validations_total",
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record how long compiling a schema validator took.
pub fn record_validator_build(mode: &'static str, elapsed: Duration) {
    metrics::histogram!("live_validator_validator_build_seconds", "mode" => mode)
        .record(elapsed.as_secs_f64());
}

/// Record a spec file load attempt.
pub fn record_spec_load(result: &'static str) {
    metrics::counter!("live_validator_specs_loaded_total", "result" => result).increment(1);
}

/// Record the number of operations currently held by the spec cache.
pub fn record_cached_operations(count: usize) {
    metrics::gauge!("live_validator_cached_operations").set(count as f64);
}

/// Record a round-trip consistency violation.
pub fn record_roundtrip_issue(code: &'static str) {
    metrics::counter!("live_validator_roundtrip_issues_total", "code" => code).increment(1);
}
