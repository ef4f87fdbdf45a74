//! Classification of request/response body differences.

use serde_json::Value;

use crate::observability::metrics;
use crate::roundtrip::attributes::{AttributeKind, Direction, OperationAttributes};
use crate::roundtrip::diff::{diff, PatchOperation};
use crate::validation::issue::{IssueCode, LiveValidationIssue, SourceLocation};

/// Diff `request_body` against `response_body` and report every change the
/// schema does not account for.
pub fn check_round_trip(
    attributes: &OperationAttributes,
    request_body: &Value,
    response_body: &Value,
    source: &SourceLocation,
) -> Vec<LiveValidationIssue> {
    let mut issues = Vec::new();
    for operation in diff(request_body, response_body) {
        let issue = match &operation {
            PatchOperation::Replace {
                path,
                value,
                old_value,
            } => (!replace_allowed(attributes, path)).then(|| {
                let old = old_value.to_string();
                let new = value.to_string();
                LiveValidationIssue::from_code(
                    IssueCode::RoundtripInconsistentProperty,
                    &[("path", path.as_str()), ("old", old.as_str()), ("new", new.as_str())],
                    Some(path.as_str()),
                    source.clone(),
                )
            }),
            PatchOperation::Add { path, .. } => (!add_allowed(attributes, path)).then(|| {
                LiveValidationIssue::from_code(
                    IssueCode::RoundtripAdditionalProperty,
                    &[("path", path.as_str())],
                    Some(path.as_str()),
                    source.clone(),
                )
            }),
            PatchOperation::Remove { path, .. } => (!remove_allowed(attributes, path)).then(|| {
                LiveValidationIssue::from_code(
                    IssueCode::RoundtripMissingProperty,
                    &[("path", path.as_str())],
                    Some(path.as_str()),
                    source.clone(),
                )
            }),
        };
        if let Some(issue) = issue {
            tracing::debug!(code = %issue.code, path = operation.path(), "Round-trip difference");
            metrics::record_roundtrip_issue(issue.code.as_str());
            issues.push(issue);
        }
    }
    issues
}

fn replace_allowed(attributes: &OperationAttributes, path: &str) -> bool {
    attributes.covers(AttributeKind::ReadOnly, path, Direction::Any)
        || attributes.has(AttributeKind::Default, path, Direction::Any)
        || attributes
            .mutability(path, Direction::Any)
            .is_some_and(|m| contains(m, "create") && contains(m, "read"))
}

fn add_allowed(attributes: &OperationAttributes, path: &str) -> bool {
    attributes.covers(AttributeKind::ReadOnly, path, Direction::Any)
        || attributes.has(AttributeKind::Default, path, Direction::Any)
}

fn remove_allowed(attributes: &OperationAttributes, path: &str) -> bool {
    attributes.covers(AttributeKind::Secret, path, Direction::Parameters)
        || attributes
            .mutability(path, Direction::Parameters)
            .is_some_and(|m| (contains(m, "create") || contains(m, "update")) && !contains(m, "read"))
}

fn contains(values: &[String], wanted: &str) -> bool {
    values.iter().any(|v| v == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse_spec;
    use serde_json::json;
    use std::path::Path;

    fn attributes(state: Value) -> OperationAttributes {
        let document = json!({
            "swagger": "2.0",
            "info": {"title": "Foo", "version": "2021-01-01"},
            "paths": {
                "/things/{name}": {
                    "put": {
                        "operationId": "Things_Create",
                        "parameters": [
                            {"name": "name", "in": "path", "required": true, "type": "string"},
                            {"name": "thing", "in": "body", "schema": {"$ref": "#/definitions/Thing"}}
                        ],
                        "responses": {
                            "200": {"description": "OK", "schema": {"$ref": "#/definitions/Thing"}}
                        }
                    }
                }
            },
            "definitions": {
                "Thing": {
                    "properties": {
                        "id": {"type": "string", "readOnly": true},
                        "properties": {
                            "properties": {
                                "state": state,
                                "tier": {"type": "string", "default": "basic"},
                                "password": {"type": "string", "x-ms-secret": true},
                                "adminKey": {"type": "string", "x-ms-mutability": ["create", "update"]},
                                "zone": {"type": "string", "x-ms-mutability": ["create", "read"]}
                            }
                        }
                    }
                }
            }
        });
        let spec = parse_spec(Path::new("things.json"), &document).unwrap();
        OperationAttributes::extract(&spec.operations[0])
    }

    #[test]
    fn test_read_only_replace_is_allowed() {
        let attrs = attributes(json!({"type": "string", "readOnly": true}));
        let issues = check_round_trip(
            &attrs,
            &json!({"properties": {"state": "A"}}),
            &json!({"properties": {"state": "B"}}),
            &SourceLocation::default(),
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_undocumented_replace_is_inconsistent() {
        let attrs = attributes(json!({"type": "string"}));
        let issues = check_round_trip(
            &attrs,
            &json!({"properties": {"state": "A"}}),
            &json!({"properties": {"state": "B"}}),
            &SourceLocation::default(),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::RoundtripInconsistentProperty);
        assert_eq!(issues[0].paths_in_payload, vec!["/properties/state"]);
        assert!(issues[0].message.contains("Request: \"A\". Response: \"B\""));
    }

    #[test]
    fn test_add_rules() {
        let attrs = attributes(json!({"type": "string"}));
        let issues = check_round_trip(
            &attrs,
            &json!({"properties": {}}),
            &json!({"id": "/x", "properties": {"tier": "basic", "extra": 1}}),
            &SourceLocation::default(),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::RoundtripAdditionalProperty);
        assert_eq!(issues[0].paths_in_payload, vec!["/properties/extra"]);
    }

    #[test]
    fn test_remove_rules() {
        let attrs = attributes(json!({"type": "string"}));
        let issues = check_round_trip(
            &attrs,
            &json!({"properties": {"password": "p", "adminKey": "k", "zone": "1", "state": "A"}}),
            &json!({"properties": {}}),
            &SourceLocation::default(),
        );
        let paths: Vec<_> = issues.iter().map(|i| i.paths_in_payload[0].as_str()).collect();
        assert_eq!(paths, vec!["/properties/state", "/properties/zone"]);
        assert!(issues
            .iter()
            .all(|i| i.code == IssueCode::RoundtripMissingProperty));
    }

    #[test]
    fn test_mutability_create_read_allows_replace() {
        let attrs = attributes(json!({"type": "string"}));
        let issues = check_round_trip(
            &attrs,
            &json!({"properties": {"zone": "1"}}),
            &json!({"properties": {"zone": "2"}}),
            &SourceLocation::default(),
        );
        assert!(issues.is_empty());
    }
}
