//! Spec cache: provider → api-version → method → operations.
//!
//! # Responsibilities
//! - Register operations under lower-cased provider, api-version and method keys
//! - Narrow a lookup level by level, reporting which level failed
//! - Pick the best path match with query-constrained > plain > multi-segment priority
//!
//! # Design Decisions
//! - Built once during initialization, read-only afterwards (shared behind `Arc`)
//! - Candidates within a method bucket keep insertion order
//! - Ambiguity is an error rather than a silent first pick

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::routing::error::{CandidateInfo, ResolveError};
use crate::routing::request::{provider_from_path, ValidationRequest, UNKNOWN_API_VERSION, UNKNOWN_PROVIDER};
use crate::spec::{Operation, Spec};

/// Spec titles that map onto a provider when the path does not name one.
pub const KNOWN_TITLE_TO_PROVIDER: &[(&str, &str)] =
    &[("ResourceManagementClient", "Microsoft.Resources")];

/// A resolved operation together with the capture values of its path match.
#[derive(Debug, Clone)]
pub struct OperationMatch {
    pub operation: Arc<Operation>,
    captures: Vec<Option<String>>,
}

impl OperationMatch {
    pub fn new(operation: Arc<Operation>, captures: Vec<Option<String>>) -> Self {
        Self {
            operation,
            captures,
        }
    }

    /// Raw capture values by group index (group 0 is the whole match).
    pub fn captures(&self) -> &[Option<String>] {
        &self.captures
    }

    /// Decoded path parameter values by name.
    pub fn path_params(&self) -> BTreeMap<String, String> {
        self.operation.path.extract_params(&self.captures)
    }
}

impl PartialEq for OperationMatch {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.operation, &other.operation) && self.captures == other.captures
    }
}

/// Priority tier of a path match. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchTier {
    QueryConstrained,
    Plain,
    MultiSegment,
}

#[derive(Debug, Default)]
struct ApiVersionEntry {
    methods: HashMap<String, Vec<Arc<Operation>>>,
}

#[derive(Debug, Default)]
struct ProviderEntry {
    api_versions: HashMap<String, ApiVersionEntry>,
}

/// Nested operation index.
#[derive(Debug, Default)]
pub struct SpecCache {
    providers: HashMap<String, ProviderEntry>,
    operation_count: usize,
}

impl SpecCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every operation of a loaded spec.
    pub fn add_spec(&mut self, spec: &Spec) {
        for operation in &spec.operations {
            self.add_operation(Arc::clone(operation));
        }
    }

    /// Register a single operation under its provider, api-version and method.
    pub fn add_operation(&mut self, operation: Arc<Operation>) {
        let provider = operation_provider(&operation).to_lowercase();
        let api_version = operation
            .spec
            .api_version
            .as_deref()
            .unwrap_or(UNKNOWN_API_VERSION)
            .to_lowercase();
        let method = operation.method.as_str().to_string();

        tracing::trace!(
            provider = %provider,
            api_version = %api_version,
            method = %method,
            operation_id = %operation.operation_id,
            "Caching operation"
        );

        self.providers
            .entry(provider)
            .or_default()
            .api_versions
            .entry(api_version)
            .or_default()
            .methods
            .entry(method)
            .or_default()
            .push(operation);
        self.operation_count += 1;
    }

    pub fn operation_count(&self) -> usize {
        self.operation_count
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Find the single operation matching a request.
    pub fn search(&self, request: &ValidationRequest) -> Result<OperationMatch, ResolveError> {
        if request.path_str.is_empty() {
            return Err(ResolveError::PathNotFound {
                url: request.request_url.clone(),
            });
        }

        let provider = self
            .providers
            .get(&request.provider_namespace)
            .ok_or_else(|| ResolveError::ProviderNotFound {
                provider: request.provider_namespace.clone(),
            })?;

        if request.api_version.is_empty() {
            return Err(ResolveError::ApiVersionMissing {
                url: request.request_url.clone(),
            });
        }

        let api = provider
            .api_versions
            .get(&request.api_version)
            .ok_or_else(|| ResolveError::ApiVersionNotFound {
                api_version: request.api_version.clone(),
                provider: request.provider_namespace.clone(),
            })?;

        let candidates = api
            .methods
            .get(&request.request_method)
            .ok_or_else(|| ResolveError::VerbNotFound {
                method: request.request_method.clone(),
                api_version: request.api_version.clone(),
                provider: request.provider_namespace.clone(),
            })?;

        let mut matches: Vec<(MatchTier, OperationMatch)> = candidates
            .iter()
            .filter_map(|operation| match_operation(operation, request))
            .collect();

        let Some(best) = matches.iter().map(|(tier, _)| *tier).min() else {
            return Err(ResolveError::OperationNotFound {
                method: request.request_method.clone(),
                api_version: request.api_version.clone(),
                provider: request.provider_namespace.clone(),
            });
        };
        matches.retain(|(tier, _)| *tier == best);

        if matches.len() > 1 {
            let candidates = matches
                .iter()
                .map(|(_, m)| CandidateInfo {
                    operation_id: m.operation.operation_id.clone(),
                    path: m.operation.path_template.clone(),
                    spec_path: m.operation.spec.file_path.clone(),
                })
                .collect();
            return Err(ResolveError::MultipleOperationsFound {
                url: request.request_url.clone(),
                method: request.request_method.clone(),
                candidates,
            });
        }

        matches
            .pop()
            .map(|(_, m)| m)
            .ok_or_else(|| ResolveError::OperationNotFound {
                method: request.request_method.clone(),
                api_version: request.api_version.clone(),
                provider: request.provider_namespace.clone(),
            })
    }
}

fn match_operation(
    operation: &Arc<Operation>,
    request: &ValidationRequest,
) -> Option<(MatchTier, OperationMatch)> {
    let path = &operation.path;
    let captures = path.captures(&request.host, &request.path_str)?;
    let tier = match path.query_constraint() {
        Some(constraint) if constraint.is_satisfied_by(&request.query) => {
            MatchTier::QueryConstrained
        }
        Some(_) => return None,
        None if path.multi_segment_first_param() => MatchTier::MultiSegment,
        None => MatchTier::Plain,
    };
    Some((tier, OperationMatch::new(Arc::clone(operation), captures)))
}

/// Provider key an operation is registered under.
///
/// Resolution order: last `/providers/<ns>` segment of the path template, the
/// data-plane folder of the spec file, a well-known spec title, and finally
/// the unknown provider.
pub fn operation_provider(operation: &Operation) -> String {
    if let Some(provider) = provider_from_path(&operation.path_template) {
        if !provider.starts_with('{') {
            return provider.to_string();
        }
    }
    let spec = &operation.spec;
    if let Some(provider) = &spec.data_plane_provider {
        return provider.clone();
    }
    spec.title
        .as_deref()
        .and_then(|title| KNOWN_TITLE_TO_PROVIDER.iter().find(|(t, _)| *t == title))
        .map(|(_, provider)| provider.to_string())
        .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string())
}
