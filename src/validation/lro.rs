//! Long-running operation response checks.
//!
//! Applies to the initial response of operations marked
//! `x-ms-long-running-operation`, under ARM policy, for 2xx status codes whose
//! declared response carries a schema.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::spec::{HttpMethod, Operation};
use crate::validation::issue::{IssueCode, LiveValidationIssue, SourceLocation};

const TERMINAL_STATES: [&str; 3] = ["Succeeded", "Failed", "Canceled"];

/// Check the status code and polling headers of an LRO initial response.
///
/// `headers` must be keyed by lower-cased header name.
pub fn validate_lro_response(
    operation: &Operation,
    status_code: &str,
    headers: &BTreeMap<String, String>,
    body: Option<&Value>,
    source: &SourceLocation,
) -> Vec<LiveValidationIssue> {
    let accepted: &[&str] = match operation.method {
        HttpMethod::Post => &["201", "202"],
        HttpMethod::Patch => &["201", "202"],
        HttpMethod::Put => &["201", "202"],
        HttpMethod::Delete => &["202"],
        _ => return Vec::new(),
    };
    let terminal: &[&str] = match operation.method {
        HttpMethod::Patch => &["200"],
        _ => &["200", "204"],
    };

    if accepted.contains(&status_code) {
        if status_code == "201" && is_terminal_provisioning(body) {
            return Vec::new();
        }
        if !has_polling_header(headers) {
            return vec![LiveValidationIssue::from_code(
                IssueCode::LroResponseHeader,
                &[("header", "location or azure-AsyncOperation")],
                Some("/headers"),
                source.clone(),
            )];
        }
        Vec::new()
    } else if terminal.contains(&status_code) {
        Vec::new()
    } else {
        vec![LiveValidationIssue::from_code(
            IssueCode::LroResponseCode,
            &[("statusCode", status_code)],
            Some("/statusCode"),
            source.clone(),
        )]
    }
}

/// A 201 whose body reports no, or a terminal, provisioning state needs no polling header.
fn is_terminal_provisioning(body: Option<&Value>) -> bool {
    let Some(body) = body else {
        return false;
    };
    match body
        .pointer("/properties/provisioningState")
        .and_then(Value::as_str)
    {
        None => true,
        Some(state) => TERMINAL_STATES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(state)),
    }
}

fn has_polling_header(headers: &BTreeMap<String, String>) -> bool {
    ["location", "azure-asyncoperation"]
        .iter()
        .any(|name| headers.get(*name).is_some_and(|v| !v.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::matcher::PathMatcher;
    use crate::spec::SpecInfo;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn lro(method: HttpMethod) -> Operation {
        let path = PathMatcher::compile("", "", "/things/{name}", &HashSet::new()).unwrap();
        Operation::new(
            "Things_Op",
            method,
            Arc::new(path),
            Vec::new(),
            BTreeMap::new(),
            true,
            Vec::new(),
            Vec::new(),
            Arc::new(SpecInfo::default()),
            Value::Null,
            "",
        )
    }

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn codes(issues: &[LiveValidationIssue]) -> Vec<IssueCode> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn test_delete_200_is_accepted() {
        let issues = validate_lro_response(
            &lro(HttpMethod::Delete),
            "200",
            &headers(&[]),
            None,
            &SourceLocation::default(),
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_delete_202_without_header() {
        let issues = validate_lro_response(
            &lro(HttpMethod::Delete),
            "202",
            &headers(&[]),
            None,
            &SourceLocation::default(),
        );
        assert_eq!(codes(&issues), vec![IssueCode::LroResponseHeader]);
    }

    #[test]
    fn test_delete_202_with_async_header() {
        let issues = validate_lro_response(
            &lro(HttpMethod::Delete),
            "202",
            &headers(&[("azure-asyncoperation", "https://poll")]),
            None,
            &SourceLocation::default(),
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_put_201_terminal_state_needs_no_header() {
        let body = json!({"properties": {"provisioningState": "Succeeded"}});
        let issues = validate_lro_response(
            &lro(HttpMethod::Put),
            "201",
            &headers(&[]),
            Some(&body),
            &SourceLocation::default(),
        );
        assert!(issues.is_empty());

        let body = json!({"properties": {"provisioningState": "Creating"}});
        let issues = validate_lro_response(
            &lro(HttpMethod::Put),
            "201",
            &headers(&[]),
            Some(&body),
            &SourceLocation::default(),
        );
        assert_eq!(codes(&issues), vec![IssueCode::LroResponseHeader]);
    }

    #[test]
    fn test_patch_204_is_rejected() {
        let issues = validate_lro_response(
            &lro(HttpMethod::Patch),
            "204",
            &headers(&[]),
            None,
            &SourceLocation::default(),
        );
        assert_eq!(codes(&issues), vec![IssueCode::LroResponseCode]);
        assert!(issues[0].message.contains("but 204 being returned"));
    }

    #[test]
    fn test_get_is_not_checked() {
        let issues = validate_lro_response(
            &lro(HttpMethod::Get),
            "203",
            &headers(&[]),
            None,
            &SourceLocation::default(),
        );
        assert!(issues.is_empty());
    }
}
