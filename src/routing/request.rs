//! Request URL parsing into cache lookup keys.
//!
//! # Responsibilities
//! - Resolve relative URLs against the management endpoint
//! - Extract provider namespace, resource type and api-version
//! - Normalize keys to lower case for case-insensitive lookup
//! - Apply data-plane host hints when the path carries no provider

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::config::DataPlaneHint;
use crate::routing::error::RequestParseError;

/// Provider used when neither the path nor a data-plane hint names one.
pub const UNKNOWN_PROVIDER: &str = "microsoft.unknown";

/// Api version used for requests without an `api-version` query parameter.
pub const UNKNOWN_API_VERSION: &str = "unknown-api-version";

/// Base for relative request URLs.
pub const DEFAULT_BASE_URL: &str = "https://management.azure.com";

static PROVIDER_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/providers/([^/]+)").expect("static regex"));

/// Lookup key derived from a request URL and method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub provider_namespace: String,
    pub resource_type: String,
    pub api_version: String,
    pub request_method: String,
    pub host: String,
    pub path_str: String,
    /// Query parameters with lower-cased keys.
    pub query: BTreeMap<String, String>,
    pub correlation_id: String,
    pub activity_id: String,
    pub request_url: String,
}

/// Parse a raw request URL and method into a [`ValidationRequest`].
pub fn parse_validation_request(
    request_url: &str,
    method: &str,
    correlation_id: &str,
    activity_id: &str,
    data_plane: &[DataPlaneHint],
) -> Result<ValidationRequest, RequestParseError> {
    if request_url.trim().is_empty() {
        return Err(RequestParseError::EmptyUrl);
    }
    if method.trim().is_empty() {
        return Err(RequestParseError::EmptyMethod);
    }

    let invalid = |e: url::ParseError| RequestParseError::InvalidUrl {
        url: request_url.to_string(),
        message: e.to_string(),
    };
    let base = Url::parse(DEFAULT_BASE_URL).map_err(invalid)?;
    let parsed = Url::options()
        .base_url(Some(&base))
        .parse(request_url)
        .map_err(invalid)?;

    let host = parsed.host_str().unwrap_or_default().to_string();
    let path_str = parsed.path().to_string();
    let query: BTreeMap<String, String> = parsed
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
        .collect();

    let mut api_version = query
        .get("api-version")
        .map(|v| v.to_lowercase())
        .unwrap_or_else(|| UNKNOWN_API_VERSION.to_string());

    let provider = match provider_from_path(&path_str) {
        Some(provider) => provider.to_string(),
        None => match data_plane_provider(&host, data_plane) {
            Some(provider) => provider.to_string(),
            None => {
                api_version = UNKNOWN_API_VERSION.to_string();
                UNKNOWN_PROVIDER.to_string()
            }
        },
    };

    Ok(ValidationRequest {
        resource_type: resource_type(&path_str, &provider),
        provider_namespace: provider.to_lowercase(),
        api_version,
        request_method: method.to_lowercase(),
        host,
        path_str,
        query,
        correlation_id: correlation_id.to_string(),
        activity_id: activity_id.to_string(),
        request_url: request_url.to_string(),
    })
}

/// Provider namespace named by the last `/providers/<ns>` segment of a path.
pub fn provider_from_path(path: &str) -> Option<&str> {
    PROVIDER_SEGMENT
        .captures_iter(path)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Resource type: the segment after the provider, or the first path segment
/// for paths without one.
pub fn resource_type(path: &str, provider: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let after_provider = segments
        .iter()
        .rposition(|s| s.eq_ignore_ascii_case(provider))
        .filter(|i| *i > 0 && segments[*i - 1].eq_ignore_ascii_case("providers"))
        .and_then(|i| segments.get(i + 1));
    after_provider
        .or_else(|| segments.first())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

fn data_plane_provider<'a>(host: &str, hints: &'a [DataPlaneHint]) -> Option<&'a str> {
    let host = host.to_lowercase();
    hints
        .iter()
        .find(|hint| host.ends_with(&hint.host_suffix.to_lowercase()))
        .map(|hint| hint.provider.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> ValidationRequest {
        parse_validation_request(url, "GET", "c1", "a1", &[]).unwrap()
    }

    #[test]
    fn test_arm_request() {
        let req = parse(
            "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.AVS/privateClouds/pc1?api-version=2020-03-20",
        );
        assert_eq!(req.provider_namespace, "microsoft.avs");
        assert_eq!(req.resource_type, "privateclouds");
        assert_eq!(req.api_version, "2020-03-20");
        assert_eq!(req.request_method, "get");
        assert_eq!(req.host, "management.azure.com");
        assert_eq!(req.correlation_id, "c1");
    }

    #[test]
    fn test_provider_from_path_takes_last_segment() {
        assert_eq!(
            provider_from_path(
                "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.AVS/privateClouds/pc1"
            ),
            Some("Microsoft.AVS")
        );
        assert_eq!(
            provider_from_path(
                "/subscriptions/s/providers/Microsoft.Compute/vms/v/providers/Microsoft.Insights/diagnosticSettings/d"
            ),
            Some("Microsoft.Insights")
        );
        assert_eq!(
            provider_from_path(
                "/subscriptions/x/resourceGroups/y/providers/Microsoft.Features/providers/Microsoft.AVS/features"
            ),
            Some("Microsoft.AVS")
        );
        assert_eq!(provider_from_path("/subscriptions/s1"), None);
    }

    #[test]
    fn test_unknown_provider_forces_unknown_api_version() {
        let req = parse("/subscriptions/s1?api-version=2020-01-01");
        assert_eq!(req.provider_namespace, UNKNOWN_PROVIDER);
        assert_eq!(req.api_version, UNKNOWN_API_VERSION);
        assert_eq!(req.resource_type, "subscriptions");
    }

    #[test]
    fn test_missing_api_version() {
        let req = parse("/providers/Microsoft.Foo/bars");
        assert_eq!(req.api_version, UNKNOWN_API_VERSION);
        assert_eq!(req.provider_namespace, "microsoft.foo");
    }

    #[test]
    fn test_query_keys_lowercased_values_kept() {
        let req = parse("/providers/Microsoft.Foo/bars?API-Version=2021-01-01-Preview&Kind=Big");
        assert_eq!(req.api_version, "2021-01-01-preview");
        assert_eq!(req.query.get("kind").map(String::as_str), Some("Big"));
        assert_eq!(
            req.query.get("api-version").map(String::as_str),
            Some("2021-01-01-Preview")
        );
    }

    #[test]
    fn test_nested_provider_namespaces() {
        let req = parse(
            "/subscriptions/randomSub/providers/Microsoft.Features/providers/Microsoft.AVS/features?api-version=2019-07-01",
        );
        assert_eq!(req.provider_namespace, "microsoft.avs");
        assert_eq!(req.resource_type, "features");
        assert_eq!(req.api_version, "2019-07-01");
    }

    #[test]
    fn test_absolute_url_keeps_host() {
        let req = parse("https://example.vault.azure.net/secrets/s1?api-version=7.0");
        assert_eq!(req.host, "example.vault.azure.net");
        assert_eq!(req.path_str, "/secrets/s1");
    }

    #[test]
    fn test_data_plane_hint() {
        let hints = vec![DataPlaneHint {
            host_suffix: ".vault.azure.net".to_string(),
            provider: "Microsoft.KeyVault".to_string(),
        }];
        let req = parse_validation_request(
            "https://example.vault.azure.net/secrets/s1?api-version=7.0",
            "get",
            "",
            "",
            &hints,
        )
        .unwrap();
        assert_eq!(req.provider_namespace, "microsoft.keyvault");
        assert_eq!(req.api_version, "7.0");
        assert_eq!(req.resource_type, "secrets");
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert_eq!(
            parse_validation_request("", "get", "", "", &[]),
            Err(RequestParseError::EmptyUrl)
        );
        assert_eq!(
            parse_validation_request("/x", " ", "", "", &[]),
            Err(RequestParseError::EmptyMethod)
        );
    }
}
