//! Operation resolution errors.
//!
//! Each variant maps to a stable wire code via [`ResolveError::code`]; the
//! display text is the human-readable message reported next to it.

use serde::Serialize;

/// Short description of one candidate when a lookup is ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateInfo {
    #[serde(rename = "operationId")]
    pub operation_id: String,
    pub path: String,
    #[serde(rename = "specPath")]
    pub spec_path: String,
}

fn describe(candidates: &[CandidateInfo]) -> String {
    serde_json::to_string(candidates).unwrap_or_default()
}

/// Why a request could not be mapped onto exactly one operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Could not find path from requestUrl: \"{url}\".")]
    PathNotFound { url: String },

    #[error("Could not find provider \"{provider}\" in the cache.")]
    ProviderNotFound { provider: String },

    #[error("Could not find api-version in requestUrl \"{url}\".")]
    ApiVersionMissing { url: String },

    #[error("Could not find exact api-version \"{api_version}\" for provider \"{provider}\" in the cache.")]
    ApiVersionNotFound {
        api_version: String,
        provider: String,
    },

    #[error("Could not find any methods with verb \"{method}\" for api-version \"{api_version}\" and provider \"{provider}\" in the cache.")]
    VerbNotFound {
        method: String,
        api_version: String,
        provider: String,
    },

    #[error("Could not find best match operation for verb \"{method}\" for api-version \"{api_version}\" and provider \"{provider}\" in the cache.")]
    OperationNotFound {
        method: String,
        api_version: String,
        provider: String,
    },

    #[error("Found multiple matching operations for request url \"{url}\" with HTTP Method \"{method}\". Operation Information: {}", describe(.candidates))]
    MultipleOperationsFound {
        url: String,
        method: String,
        candidates: Vec<CandidateInfo>,
    },
}

impl ResolveError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::PathNotFound { .. } => "PATH_NOT_FOUND_IN_REQUEST_URL",
            ResolveError::ProviderNotFound { .. } => "OPERATION_NOT_FOUND_IN_CACHE_WITH_PROVIDER",
            ResolveError::ApiVersionMissing { .. } | ResolveError::ApiVersionNotFound { .. } => {
                "OPERATION_NOT_FOUND_IN_CACHE_WITH_API"
            }
            ResolveError::VerbNotFound { .. } => "OPERATION_NOT_FOUND_IN_CACHE_WITH_VERB",
            ResolveError::OperationNotFound { .. } => "OPERATION_NOT_FOUND_IN_CACHE",
            ResolveError::MultipleOperationsFound { .. } => "MULTIPLE_OPERATIONS_FOUND",
        }
    }
}

/// Failure to turn a raw URL + method into a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestParseError {
    #[error("url parameter is required and must be a non-empty string")]
    EmptyUrl,

    #[error("method parameter is required and must be a non-empty string")]
    EmptyMethod,

    #[error("failed to parse request url \"{url}\": {message}")]
    InvalidUrl { url: String, message: String },
}

impl RequestParseError {
    pub fn code(&self) -> &'static str {
        "POTENTIAL_OPERATION_SEARCH_ERROR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = ResolveError::ProviderNotFound {
            provider: "microsoft.foo".to_string(),
        };
        assert_eq!(err.code(), "OPERATION_NOT_FOUND_IN_CACHE_WITH_PROVIDER");
        assert_eq!(
            err.to_string(),
            "Could not find provider \"microsoft.foo\" in the cache."
        );
        assert_eq!(
            RequestParseError::EmptyUrl.code(),
            "POTENTIAL_OPERATION_SEARCH_ERROR"
        );
    }

    #[test]
    fn test_multiple_operations_message_lists_candidates() {
        let err = ResolveError::MultipleOperationsFound {
            url: "/things/1".to_string(),
            method: "get".to_string(),
            candidates: vec![CandidateInfo {
                operation_id: "Things_Get".to_string(),
                path: "/things/{id}".to_string(),
                spec_path: "a.json".to_string(),
            }],
        };
        let message = err.to_string();
        assert!(message.contains("\"operationId\":\"Things_Get\""));
        assert_eq!(err.code(), "MULTIPLE_OPERATIONS_FOUND");
    }
}
