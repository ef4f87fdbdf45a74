//! Request and response validation against a resolved operation.
//!
//! # Responsibilities
//! - Assemble the `{path, query, headers, body}` payload the request schema expects
//! - Coerce declared non-string parameter values before schema validation
//! - Check `consumes`/`produces` against `Content-Type`
//! - Remap engine issues onto payload pointers and traffic-level codes
//! - Run the long-running-operation check for ARM responses

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::live::traffic::{lowercase_headers, LiveRequest, LiveResponse};
use crate::pointer;
use crate::routing::OperationMatch;
use crate::spec::{Operation, ParameterLocation};
use crate::validation::issue::{error_meta, IssueCode, LiveValidationIssue, SourceLocation};
use crate::validation::lro::validate_lro_response;
use crate::validation::schema::{
    request_validator, response_validator, SchemaError, SchemaIssue, SchemaValidator,
};

const DEFAULT_RESPONSE_CONTENT_TYPE: &str = "application/octet-stream";

/// Per-call validation policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationPolicy {
    /// ARM traffic: LRO checks run and additional-property issues are kept.
    pub is_arm_call: bool,
}

/// Validate a request against the operation it resolved to.
pub async fn validate_request(
    operation_match: &OperationMatch,
    request: &LiveRequest,
    query: &Map<String, Value>,
    engine: &dyn SchemaValidator,
    policy: ValidationPolicy,
) -> Result<Vec<LiveValidationIssue>, SchemaError> {
    let operation = &operation_match.operation;
    let validator = request_validator(operation, engine, "on_demand").await?;

    let headers = lowercase_headers(&request.headers);
    let source = SourceLocation {
        url: operation.spec.file_path.clone(),
        json_pointer: operation.json_pointer.clone(),
    };

    let mut issues = Vec::new();
    let body = request_body(operation, request.body.as_ref());
    if let (Some(content_type), Some(_)) = (headers.get("content-type"), body) {
        issues.extend(content_type_issue(content_type, &operation.consumes, &source));
    }

    let payload = request_payload(operation_match, &headers, query, body);
    let context = RemapContext {
        response_status: None,
        long_running: operation.long_running,
        policy,
        source: &source,
        operation_id: &operation.operation_id,
    };
    issues.extend(
        validator
            .validate(&payload)
            .into_iter()
            .filter_map(|issue| remap(issue, &context)),
    );
    Ok(issues)
}

/// Validate a response against the operation it answers.
///
/// `status_code` must already be normalized to its numeric string form.
pub async fn validate_response(
    operation_match: &OperationMatch,
    response: &LiveResponse,
    status_code: &str,
    engine: &dyn SchemaValidator,
    policy: ValidationPolicy,
) -> Result<Vec<LiveValidationIssue>, SchemaError> {
    let operation = &operation_match.operation;
    let source = SourceLocation {
        url: operation.spec.file_path.clone(),
        json_pointer: pointer::join(
            &pointer::join(&operation.json_pointer, "responses"),
            status_code,
        ),
    };

    let Some(declared) = operation.response_for(status_code) else {
        return Ok(vec![LiveValidationIssue::from_code(
            IssueCode::InvalidResponseCode,
            &[("statusCode", status_code)],
            Some("/statusCode"),
            SourceLocation {
                url: operation.spec.file_path.clone(),
                json_pointer: operation.json_pointer.clone(),
            },
        )]);
    };
    let validator = response_validator(operation, declared, engine, "on_demand").await?;

    let headers = lowercase_headers(&response.headers);
    let body = response.body.as_ref().filter(|b| !b.is_null());

    let mut issues = Vec::new();
    if body.is_some() {
        let content_type = headers
            .get("content-type")
            .map(String::as_str)
            .unwrap_or(DEFAULT_RESPONSE_CONTENT_TYPE);
        issues.extend(content_type_issue(content_type, &operation.produces, &source));
    }

    let mut payload = Map::new();
    let header_values = headers
        .iter()
        .map(|(name, value)| {
            let declared_type = declared
                .headers
                .get(name)
                .and_then(|schema| schema.get("type"))
                .and_then(Value::as_str);
            (name.clone(), coerce(value, declared_type))
        })
        .collect();
    payload.insert("headers".to_string(), Value::Object(header_values));
    if let Some(body) = body {
        payload.insert("body".to_string(), body.clone());
    }

    let context = RemapContext {
        response_status: Some(status_code),
        long_running: operation.long_running,
        policy,
        source: &source,
        operation_id: &operation.operation_id,
    };
    issues.extend(
        validator
            .validate(&Value::Object(payload))
            .into_iter()
            .filter_map(|issue| remap(issue, &context)),
    );

    let is_success_code = status_code
        .parse::<u16>()
        .is_ok_and(|code| (200..300).contains(&code));
    if policy.is_arm_call
        && operation.long_running
        && is_success_code
        && declared.schema.is_some()
    {
        issues.extend(validate_lro_response(
            operation,
            status_code,
            &headers,
            body,
            &source,
        ));
    }

    Ok(issues)
}

/// Query parameters parsed from a URL, with original key case and values.
pub fn query_from_url(url: &str) -> Map<String, Value> {
    let query = match url.split_once('?') {
        Some((_, query)) => query.split_once('#').map_or(query, |(q, _)| q),
        None => return Map::new(),
    };
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

/// The body to validate. An empty body for an optional body parameter counts as absent.
fn request_body<'a>(operation: &Operation, body: Option<&'a Value>) -> Option<&'a Value> {
    let body = body.filter(|b| !b.is_null())?;
    let optional = operation.body_parameter().is_some_and(|p| !p.required);
    let empty = body.as_object().is_some_and(Map::is_empty);
    if optional && empty {
        None
    } else {
        Some(body)
    }
}

fn request_payload(
    operation_match: &OperationMatch,
    headers: &BTreeMap<String, String>,
    query: &Map<String, Value>,
    body: Option<&Value>,
) -> Value {
    let operation = operation_match.operation.as_ref();

    let path: Map<String, Value> = operation_match
        .path_params()
        .into_iter()
        .map(|(name, value)| {
            let coerced = coerce(&value, declared_type(operation, ParameterLocation::Path, &name));
            (name, coerced)
        })
        .collect();

    let query: Map<String, Value> = query
        .iter()
        .map(|(name, value)| {
            let ty = declared_type(operation, ParameterLocation::Query, name);
            let coerced = match value {
                Value::String(s) => coerce(s, ty),
                other => other.clone(),
            };
            (name.to_lowercase(), coerced)
        })
        .collect();

    let headers: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            let coerced = coerce(value, declared_type(operation, ParameterLocation::Header, name));
            (name.clone(), coerced)
        })
        .collect();

    let mut payload = Map::new();
    payload.insert("path".to_string(), Value::Object(path));
    payload.insert("query".to_string(), Value::Object(query));
    payload.insert("headers".to_string(), Value::Object(headers));
    if let Some(body) = body {
        payload.insert("body".to_string(), body.clone());
    }
    Value::Object(payload)
}

fn declared_type<'a>(
    operation: &'a Operation,
    location: ParameterLocation,
    name: &str,
) -> Option<&'a str> {
    operation
        .parameters
        .iter()
        .find(|p| p.location == location && p.name.eq_ignore_ascii_case(name))
        .and_then(|p| p.value_type())
}

/// Parse a raw string into the declared primitive type, leaving it as a
/// string when it does not parse so the schema reports the mismatch.
fn coerce(raw: &str, declared_type: Option<&str>) -> Value {
    let parsed = match declared_type {
        Some("integer") => raw.parse::<i64>().ok().map(Value::from),
        Some("number") => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Some("boolean") => match raw.to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}

fn content_type_issue(
    content_type: &str,
    allowed: &[String],
    source: &SourceLocation,
) -> Option<LiveValidationIssue> {
    if allowed.is_empty() {
        return None;
    }
    let actual = media_type(content_type);
    let accepted = allowed.iter().any(|a| {
        let allowed = media_type(a);
        allowed == "*/*" || allowed == actual
    });
    if accepted {
        return None;
    }
    let supported = allowed.join(", ");
    Some(LiveValidationIssue::from_code(
        IssueCode::InvalidContentType,
        &[("contentType", content_type), ("supported", supported.as_str())],
        Some("/headers/content-type"),
        source.clone(),
    ))
}

/// Media type without parameters, lower-cased.
fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

struct RemapContext<'a> {
    /// Numeric status code when validating a response.
    response_status: Option<&'a str>,
    long_running: bool,
    policy: ValidationPolicy,
    source: &'a SourceLocation,
    operation_id: &'a str,
}

/// Turn an engine issue into a reported one, or drop it.
fn remap(issue: SchemaIssue, context: &RemapContext<'_>) -> Option<LiveValidationIssue> {
    if issue.code == IssueCode::ObjectAdditionalProperties && !context.policy.is_arm_call {
        tracing::error!(
            operation_id = %context.operation_id,
            pointer = %issue.instance_pointer,
            "Additional property ignored outside ARM policy"
        );
        return None;
    }

    let full = issue.instance_pointer.as_str();
    let in_body = full.starts_with("/body/");
    let property = issue.property.as_deref().unwrap_or_default();

    let code = match issue.code {
        IssueCode::ObjectMissingRequiredProperty if !in_body => match context.response_status {
            None => IssueCode::MissingRequiredParameter,
            Some(status) if full == "/body" => {
                if context.long_running && (status == "201" || status == "202") {
                    return None;
                }
                IssueCode::InvalidResponseBody
            }
            Some(_) if full.starts_with("/headers/") => IssueCode::InvalidResponseHeader,
            Some(_) => IssueCode::MissingRequiredParameter,
        },
        other => other,
    };

    let payload_pointer = if in_body || full == "/body" {
        &full["/body".len()..]
    } else {
        full
    };

    let (severity, message) = match code {
        IssueCode::ObjectMissingRequiredProperty | IssueCode::InvalidResponseHeader => {
            error_meta(code, &[("missingProperty", property)])
        }
        IssueCode::ObjectAdditionalProperties => {
            error_meta(code, &[("additionalProperty", property)])
        }
        IssueCode::MissingRequiredParameter | IssueCode::InvalidResponseBody => {
            error_meta(code, &[])
        }
        _ => (error_meta(code, &[]).0, issue.message),
    };

    Some(LiveValidationIssue::new(
        code,
        severity,
        message,
        Some(payload_pointer),
        issue.schema_path,
        context.source.clone(),
    ))
}
