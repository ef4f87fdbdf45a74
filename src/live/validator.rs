//! The live validator facade.
//!
//! # Responsibilities
//! - Discover and load the spec corpus, then populate the [`SpecCache`]
//! - Pre-compile schema validators at initialize time or in the background
//! - Resolve traffic to operations and run request, response and round-trip
//!   validation
//!
//! # Design Decisions
//! - Files load concurrently, cache writes stay sequential
//! - One bad spec is logged and skipped; initialization never fails on it
//! - Validate entry points never return `Err`; every failure becomes a
//!   runtime exception on that call's result
//! - Background compilation is detached; its completion is only observable
//!   through [`LiveValidator::is_background_load_complete`]
//!
//! # Data Flow
//! ```text
//! LiveRequest ──► parse_validation_request ──► SpecCache::search
//!                                                   │
//!                       ┌───────────────────────────┤
//!                       ▼                           ▼
//!              validate_request            validate_response
//!                       │                           │
//!                       └────────► LiveValidationResult
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use walkdir::WalkDir;

use crate::config::{SpecSourceConfig, ValidatorConfig};
use crate::live::traffic::{header_value, LiveRequest, LiveResponse, RequestResponsePair};
use crate::observability::metrics;
use crate::roundtrip::{check_round_trip, AttributeCache, AttributeKey};
use crate::routing::cache::operation_provider;
use crate::routing::{parse_validation_request, OperationMatch, SpecCache};
use crate::spec::{JsonSpecLoader, Operation, SpecLoader};
use crate::validation::issue::{IssueCode, SourceLocation};
use crate::validation::operation::{query_from_url, validate_request, validate_response};
use crate::validation::result::codes;
use crate::validation::schema::{request_validator, response_validator};
use crate::validation::{
    JsonSchemaValidator, LiveValidationIssue, LiveValidationResult, OperationContext,
    RequestResponseValidationResult, RuntimeException, SchemaValidator, ValidationPolicy,
};

const CORRELATION_ID_HEADER: &str = "x-ms-correlation-request-id";
const ACTIVITY_ID_HEADER: &str = "x-ms-request-id";

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// When non-empty, only issues with these codes are reported.
    pub include_errors: Vec<IssueCode>,
    /// Keep the lookup key and resolved operation on the result.
    pub include_operation_match: bool,
}

/// What [`LiveValidator::initialize`] found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitializeSummary {
    pub discovered: usize,
    pub loaded: usize,
    pub failed: usize,
    pub operations: usize,
}

pub struct LiveValidator {
    config: ValidatorConfig,
    loader: Arc<dyn SpecLoader>,
    engine: Arc<dyn SchemaValidator>,
    cache: SpecCache,
    spec_paths: Vec<PathBuf>,
    attributes: AttributeCache,
    background_complete: Arc<AtomicBool>,
}

impl LiveValidator {
    /// A validator reading Swagger JSON from disk and validating with `jsonschema`.
    pub fn new(config: ValidatorConfig) -> Self {
        Self::with_components(config, Arc::new(JsonSpecLoader), Arc::new(JsonSchemaValidator))
    }

    pub fn with_components(
        config: ValidatorConfig,
        loader: Arc<dyn SpecLoader>,
        engine: Arc<dyn SchemaValidator>,
    ) -> Self {
        Self {
            config,
            loader,
            engine,
            cache: SpecCache::new(),
            spec_paths: Vec::new(),
            attributes: AttributeCache::new(),
            background_complete: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load the configured corpus and populate the operation cache.
    pub async fn initialize(&mut self) -> InitializeSummary {
        let started = Instant::now();
        let files = discover_spec_files(&self.config.specs);
        tracing::info!(files = files.len(), "Loading specs");

        let loader = Arc::clone(&self.loader);
        let loads = files.iter().cloned().map(|path| {
            let loader = Arc::clone(&loader);
            async move {
                let result = loader.load(&path).await;
                (path, result)
            }
        });
        let results: Vec<_> = stream::iter(loads)
            .buffered(self.config.specs.load_concurrency.max(1))
            .collect()
            .await;

        let mut cache = SpecCache::new();
        let mut operations: Vec<Arc<Operation>> = Vec::new();
        let mut spec_paths = Vec::new();
        let mut failed = 0;
        for (path, result) in results {
            match result {
                Ok(spec) => {
                    cache.add_spec(&spec);
                    operations.extend(spec.operations.iter().cloned());
                    spec_paths.push(path);
                    metrics::record_spec_load("ok");
                }
                Err(e) => {
                    failed += 1;
                    metrics::record_spec_load("error");
                    tracing::warn!(spec = %path.display(), error = %e, "Skipping spec that failed to load");
                }
            }
        }

        self.cache = cache;
        self.spec_paths = spec_paths;
        metrics::record_cached_operations(self.cache.operation_count());

        let summary = InitializeSummary {
            discovered: files.len(),
            loaded: self.spec_paths.len(),
            failed,
            operations: self.cache.operation_count(),
        };
        tracing::info!(
            loaded = summary.loaded,
            failed = summary.failed,
            operations = summary.operations,
            duration_ms = started.elapsed().as_millis() as u64,
            "Spec cache populated"
        );

        self.background_complete.store(false, Ordering::Release);
        let validation = &self.config.validation;
        if validation.load_validator_in_initialize {
            compile_validators(&operations, self.engine.as_ref(), "initialize").await;
            self.background_complete.store(true, Ordering::Release);
        } else if validation.load_validator_in_background {
            fastrand::shuffle(&mut operations);
            let engine = Arc::clone(&self.engine);
            let complete = Arc::clone(&self.background_complete);
            tokio::spawn(async move {
                compile_validators(&operations, engine.as_ref(), "background").await;
                complete.store(true, Ordering::Release);
            });
        }

        summary
    }

    /// Validate one captured request.
    pub async fn validate_live_request(
        &self,
        request: &LiveRequest,
        options: &ValidateOptions,
    ) -> LiveValidationResult {
        let started = Instant::now();
        let result = match self.resolve(&request.url, &request.method, &request.headers) {
            Ok((context, operation_match)) => {
                self.request_result(request, context, &operation_match, options)
                    .await
            }
            Err(result) => result,
        };
        finish("request", started, result, options)
    }

    /// Validate one captured response of the request `method url`.
    pub async fn validate_live_response(
        &self,
        response: &LiveResponse,
        url: &str,
        method: &str,
        options: &ValidateOptions,
    ) -> LiveValidationResult {
        let started = Instant::now();
        let result = match self.resolve(url, method, &response.headers) {
            Ok((context, operation_match)) => {
                self.response_result(response, context, &operation_match, options)
                    .await
            }
            Err(result) => result,
        };
        finish("response", started, result, options)
    }

    /// Validate a `{ liveRequest, liveResponse }` envelope.
    ///
    /// The response is validated against the operation the request resolved
    /// to; a request that resolves to nothing yields the same runtime
    /// exception on both results.
    pub async fn validate_live_request_response(
        &self,
        pair: &Value,
        options: &ValidateOptions,
    ) -> RequestResponseValidationResult {
        match serde_json::from_value::<RequestResponsePair>(pair.clone()) {
            Ok(pair) => self.validate_pair(&pair, options).await,
            Err(e) => {
                let exception = RuntimeException::new(
                    codes::INCORRECT_INPUT,
                    format!("Found errors in validating the request response pair: {}", e),
                );
                tracing::warn!(error = %e, "Malformed request/response pair");
                let result = |kind| {
                    finish(
                        kind,
                        Instant::now(),
                        LiveValidationResult::runtime(OperationContext::unknown(), exception.clone()),
                        options,
                    )
                };
                RequestResponseValidationResult {
                    request_validation_result: result("request"),
                    response_validation_result: result("response"),
                    runtime_exception: Some(exception.clone()),
                }
            }
        }
    }

    /// Validate an already well-formed pair.
    pub async fn validate_pair(
        &self,
        pair: &RequestResponsePair,
        options: &ValidateOptions,
    ) -> RequestResponseValidationResult {
        let started = Instant::now();
        let request = &pair.live_request;
        let (request_result, response_result) =
            match self.resolve(&request.url, &request.method, &request.headers) {
                Ok((context, operation_match)) => {
                    let request_result = self
                        .request_result(request, context.clone(), &operation_match, options)
                        .await;
                    let response_result = self
                        .response_result(&pair.live_response, context, &operation_match, options)
                        .await;
                    (request_result, response_result)
                }
                Err(result) => (result.clone(), result),
            };
        RequestResponseValidationResult {
            request_validation_result: finish("request", started, request_result, options),
            response_validation_result: finish("response", started, response_result, options),
            runtime_exception: None,
        }
    }

    /// Check that the response body echoes the request body in documented ways.
    pub async fn validate_round_trip(&self, pair: &RequestResponsePair) -> LiveValidationResult {
        let started = Instant::now();
        let options = ValidateOptions::default();
        if !self.config.round_trip.enabled {
            let result = LiveValidationResult::runtime(
                OperationContext::unknown(),
                RuntimeException::new(
                    codes::ROUNDTRIP_VALIDATION_ERROR,
                    "Round trip validation is not enabled",
                ),
            );
            return finish("roundtrip", started, result, &options);
        }

        let request = &pair.live_request;
        let result = match self.resolve(&request.url, &request.method, &request.headers) {
            Ok((context, operation_match)) => {
                let operation = &operation_match.operation;
                match (&request.body, &pair.live_response.body) {
                    (Some(request_body), Some(response_body)) => {
                        let key = AttributeKey {
                            provider: operation_provider(operation).to_lowercase(),
                            api_version: context.api_version.clone(),
                            operation_id: operation.operation_id.clone(),
                        };
                        let attributes = self.attributes.get_or_extract(key, operation);
                        let source = SourceLocation {
                            url: operation.spec.file_path.clone(),
                            json_pointer: operation.json_pointer.clone(),
                        };
                        let issues =
                            check_round_trip(&attributes, request_body, response_body, &source);
                        LiveValidationResult::from_issues(context, issues)
                    }
                    _ => {
                        tracing::debug!(
                            operation_id = %operation.operation_id,
                            "Round trip skipped, request or response has no body"
                        );
                        LiveValidationResult::from_issues(context, Vec::new())
                    }
                }
            }
            Err(result) => result,
        };
        finish("roundtrip", started, result, &options)
    }

    /// Spec files that loaded successfully.
    pub fn spec_paths(&self) -> &[PathBuf] {
        &self.spec_paths
    }

    pub fn operation_count(&self) -> usize {
        self.cache.operation_count()
    }

    pub fn is_background_load_complete(&self) -> bool {
        self.background_complete.load(Ordering::Acquire)
    }

    pub fn cache(&self) -> &SpecCache {
        &self.cache
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            is_arm_call: self.config.validation.is_arm_call,
        }
    }

    /// Resolve traffic to a cached operation, or to a runtime-exception result.
    fn resolve(
        &self,
        url: &str,
        method: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<(OperationContext, OperationMatch), LiveValidationResult> {
        let correlation_id = header_value(headers, CORRELATION_ID_HEADER).unwrap_or_default();
        let activity_id = header_value(headers, ACTIVITY_ID_HEADER).unwrap_or_default();

        let request = parse_validation_request(
            url,
            method,
            correlation_id,
            activity_id,
            &self.config.data_plane,
        )
        .map_err(|e| {
            LiveValidationResult::runtime(
                OperationContext::unknown(),
                RuntimeException::new(e.code(), e.to_string()),
            )
        })?;

        match self.cache.search(&request) {
            Ok(operation_match) => {
                let context = OperationContext {
                    operation_id: operation_match.operation.operation_id.clone(),
                    api_version: request.api_version.clone(),
                    validation_request: Some(request),
                    operation_match: Some(operation_match.clone()),
                };
                Ok((context, operation_match))
            }
            Err(e) => {
                tracing::debug!(
                    provider = %request.provider_namespace,
                    api_version = %request.api_version,
                    correlation_id = %request.correlation_id,
                    code = e.code(),
                    "Operation not resolved"
                );
                let context = OperationContext {
                    api_version: request.api_version.clone(),
                    validation_request: Some(request),
                    ..OperationContext::unknown()
                };
                Err(LiveValidationResult::runtime(
                    context,
                    RuntimeException::new(e.code(), e.to_string()),
                ))
            }
        }
    }

    async fn request_result(
        &self,
        request: &LiveRequest,
        context: OperationContext,
        operation_match: &OperationMatch,
        options: &ValidateOptions,
    ) -> LiveValidationResult {
        let query = request
            .query
            .clone()
            .unwrap_or_else(|| query_from_url(&request.url));
        match validate_request(
            operation_match,
            request,
            &query,
            self.engine.as_ref(),
            self.policy(),
        )
        .await
        {
            Ok(issues) => LiveValidationResult::from_issues(context, filter_issues(issues, options)),
            Err(e) => {
                tracing::warn!(operation_id = %context.operation_id, error = %e, "Request validator failed to build");
                LiveValidationResult::runtime(
                    context,
                    RuntimeException::new(codes::REQUEST_VALIDATION_ERROR, e.to_string()),
                )
            }
        }
    }

    async fn response_result(
        &self,
        response: &LiveResponse,
        context: OperationContext,
        operation_match: &OperationMatch,
        options: &ValidateOptions,
    ) -> LiveValidationResult {
        let status_code = response.status_code.normalized();
        match validate_response(
            operation_match,
            response,
            &status_code,
            self.engine.as_ref(),
            self.policy(),
        )
        .await
        {
            Ok(issues) => LiveValidationResult::from_issues(context, filter_issues(issues, options)),
            Err(e) => {
                tracing::warn!(operation_id = %context.operation_id, error = %e, "Response validator failed to build");
                LiveValidationResult::runtime(
                    context,
                    RuntimeException::new(codes::RESPONSE_VALIDATION_ERROR, e.to_string()),
                )
            }
        }
    }
}

fn filter_issues(
    issues: Vec<LiveValidationIssue>,
    options: &ValidateOptions,
) -> Vec<LiveValidationIssue> {
    if options.include_errors.is_empty() {
        return issues;
    }
    issues
        .into_iter()
        .filter(|issue| options.include_errors.contains(&issue.code))
        .collect()
}

/// Log and count a finished validation, stripping the match unless asked for.
fn finish(
    kind: &'static str,
    started: Instant,
    mut result: LiveValidationResult,
    options: &ValidateOptions,
) -> LiveValidationResult {
    let outcome = match result.is_successful() {
        Some(true) => "success",
        Some(false) => "failure",
        None => "runtime_exception",
    };
    metrics::record_validation(kind, outcome);

    let correlation_id = result
        .operation_info
        .validation_request
        .as_ref()
        .map(|r| r.correlation_id.as_str())
        .unwrap_or_default();
    tracing::debug!(
        kind,
        outcome,
        operation_id = %result.operation_info.operation_id,
        api_version = %result.operation_info.api_version,
        correlation_id,
        issues = result.issues().len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Validation finished"
    );

    if !options.include_operation_match {
        result.operation_info = result.operation_info.without_match();
    }
    result
}

/// Compile every request and response validator, logging failures.
async fn compile_validators(
    operations: &[Arc<Operation>],
    engine: &dyn SchemaValidator,
    mode: &'static str,
) {
    let started = Instant::now();
    let mut failures = 0usize;
    for operation in operations {
        if let Err(e) = request_validator(operation, engine, mode).await {
            failures += 1;
            tracing::warn!(operation_id = %operation.operation_id, spec = %operation.spec.file_path, error = %e, "Request validator failed to build");
        }
        for response in operation.responses.values() {
            if let Err(e) = response_validator(operation, response, engine, mode).await {
                failures += 1;
                tracing::warn!(
                    operation_id = %operation.operation_id,
                    status_code = %response.status_code,
                    error = %e,
                    "Response validator failed to build"
                );
            }
        }
        tokio::task::yield_now().await;
    }
    tracing::info!(
        mode,
        operations = operations.len(),
        failures,
        duration_ms = started.elapsed().as_millis() as u64,
        "Validators compiled"
    );
}

/// Spec files named by the configuration, or found by scanning its directory.
pub fn discover_spec_files(config: &SpecSourceConfig) -> Vec<PathBuf> {
    if !config.paths.is_empty() {
        return config.paths.iter().map(PathBuf::from).collect();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(&config.directory)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable spec directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| is_spec_file(path, &config.excluded_patterns))
        .collect();
    files.sort();
    files
}

fn is_spec_file(path: &Path, excluded_patterns: &[String]) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return false;
    }
    let normalized = path.to_string_lossy().replace('\\', "/");
    !excluded_patterns
        .iter()
        .any(|pattern| normalized.contains(pattern.as_str()))
}
