//! Validation issues and their code → severity/message table.

use serde::{Deserialize, Serialize};

use crate::pointer;

/// Stable issue codes reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    // Schema violations
    ObjectMissingRequiredProperty,
    ObjectAdditionalProperties,
    InvalidType,
    InvalidFormat,
    EnumMismatch,
    Pattern,
    MinLength,
    MaxLength,
    Minimum,
    Maximum,
    MinimumExclusive,
    MaximumExclusive,
    MultipleOf,
    ArrayLengthShort,
    ArrayLengthLong,
    ArrayUnique,
    OneOfMissing,
    OneOfMultiple,
    AnyOfMissing,
    Unclassified,

    // Traffic-level checks
    MissingRequiredParameter,
    InvalidResponseBody,
    InvalidResponseHeader,
    InvalidResponseCode,
    InvalidContentType,
    LroResponseCode,
    LroResponseHeader,

    // Round-trip consistency
    RoundtripInconsistentProperty,
    RoundtripAdditionalProperty,
    RoundtripMissingProperty,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::ObjectMissingRequiredProperty => "OBJECT_MISSING_REQUIRED_PROPERTY",
            IssueCode::ObjectAdditionalProperties => "OBJECT_ADDITIONAL_PROPERTIES",
            IssueCode::InvalidType => "INVALID_TYPE",
            IssueCode::InvalidFormat => "INVALID_FORMAT",
            IssueCode::EnumMismatch => "ENUM_MISMATCH",
            IssueCode::Pattern => "PATTERN",
            IssueCode::MinLength => "MIN_LENGTH",
            IssueCode::MaxLength => "MAX_LENGTH",
            IssueCode::Minimum => "MINIMUM",
            IssueCode::Maximum => "MAXIMUM",
            IssueCode::MinimumExclusive => "MINIMUM_EXCLUSIVE",
            IssueCode::MaximumExclusive => "MAXIMUM_EXCLUSIVE",
            IssueCode::MultipleOf => "MULTIPLE_OF",
            IssueCode::ArrayLengthShort => "ARRAY_LENGTH_SHORT",
            IssueCode::ArrayLengthLong => "ARRAY_LENGTH_LONG",
            IssueCode::ArrayUnique => "ARRAY_UNIQUE",
            IssueCode::OneOfMissing => "ONE_OF_MISSING",
            IssueCode::OneOfMultiple => "ONE_OF_MULTIPLE",
            IssueCode::AnyOfMissing => "ANY_OF_MISSING",
            IssueCode::Unclassified => "UNCLASSIFIED",
            IssueCode::MissingRequiredParameter => "MISSING_REQUIRED_PARAMETER",
            IssueCode::InvalidResponseBody => "INVALID_RESPONSE_BODY",
            IssueCode::InvalidResponseHeader => "INVALID_RESPONSE_HEADER",
            IssueCode::InvalidResponseCode => "INVALID_RESPONSE_CODE",
            IssueCode::InvalidContentType => "INVALID_CONTENT_TYPE",
            IssueCode::LroResponseCode => "LRO_RESPONSE_CODE",
            IssueCode::LroResponseHeader => "LRO_RESPONSE_HEADER",
            IssueCode::RoundtripInconsistentProperty => "ROUNDTRIP_INCONSISTENT_PROPERTY",
            IssueCode::RoundtripAdditionalProperty => "ROUNDTRIP_ADDITIONAL_PROPERTY",
            IssueCode::RoundtripMissingProperty => "ROUNDTRIP_MISSING_PROPERTY",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Information,
    Verbose,
}

/// Severity and message template for a code. Placeholders are `{name}`.
fn definition(code: IssueCode) -> (Severity, &'static str) {
    use IssueCode::*;
    match code {
        ObjectMissingRequiredProperty => {
            (Severity::Critical, "Missing required property: {missingProperty}")
        }
        ObjectAdditionalProperties => (
            Severity::Critical,
            "Additional properties not allowed: {additionalProperty}",
        ),
        InvalidType => (Severity::Critical, "Expected type {type} but found type {data}"),
        EnumMismatch => (Severity::Critical, "No enum match for: {data}"),
        InvalidFormat | Pattern | MinLength | MaxLength | Minimum | Maximum
        | MinimumExclusive | MaximumExclusive | MultipleOf | ArrayLengthShort
        | ArrayLengthLong | ArrayUnique | OneOfMissing | OneOfMultiple | AnyOfMissing
        | Unclassified => (Severity::Critical, "{message}"),
        MissingRequiredParameter => (Severity::Critical, "Value is required but was not provided"),
        InvalidResponseBody => (
            Severity::Critical,
            "Body is required in response but not provided",
        ),
        InvalidResponseHeader => (
            Severity::Error,
            "Header {missingProperty} is required in response but not provided",
        ),
        InvalidResponseCode => (
            Severity::Critical,
            "The swagger file does not define '{statusCode}' response code",
        ),
        InvalidContentType => (
            Severity::Error,
            "Invalid Content-Type ({contentType}).  These are supported: {supported}",
        ),
        LroResponseCode => (
            Severity::Critical,
            "Respond to the initial request of a long running operation, Patch/Post call must return 201 or 202, Delete call must return 202 or 204, Put call must return 202 or 201 or 200, but {statusCode} being returned",
        ),
        LroResponseHeader => (
            Severity::Critical,
            "Long running operation should return {header} in header but not provided",
        ),
        RoundtripInconsistentProperty => (
            Severity::Critical,
            "The property's value in the response is different from what was set in the request. Path: {path}. Request: {old}. Response: {new}",
        ),
        RoundtripAdditionalProperty => (
            Severity::Critical,
            "The property is returned in the response, but it is not in the request. Path: {path}",
        ),
        RoundtripMissingProperty => (
            Severity::Critical,
            "The property is present in the request but it's missing in the response. Path: {path}",
        ),
    }
}

/// Render a code's message with named parameters.
pub fn error_meta(code: IssueCode, params: &[(&str, &str)]) -> (Severity, String) {
    let (severity, template) = definition(code);
    let message = params.iter().fold(template.to_string(), |message, (name, value)| {
        message.replace(&format!("{{{}}}", name), value)
    });
    (severity, message)
}

/// Where in the spec an issue originates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub url: String,
    pub json_pointer: String,
}

/// One reported validation problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveValidationIssue {
    pub code: IssueCode,
    pub severity: Severity,
    pub message: String,
    pub paths_in_payload: Vec<String>,
    pub json_paths_in_payload: Vec<String>,
    pub schema_path: String,
    pub source: SourceLocation,
    pub documentation_url: String,
}

impl LiveValidationIssue {
    /// Build an issue whose message comes from the code table.
    pub fn from_code(
        code: IssueCode,
        params: &[(&str, &str)],
        payload_pointer: Option<&str>,
        source: SourceLocation,
    ) -> Self {
        let (severity, message) = error_meta(code, params);
        Self::new(code, severity, message, payload_pointer, String::new(), source)
    }

    pub fn new(
        code: IssueCode,
        severity: Severity,
        message: String,
        payload_pointer: Option<&str>,
        schema_path: String,
        source: SourceLocation,
    ) -> Self {
        let (paths_in_payload, json_paths_in_payload) = match payload_pointer {
            Some(p) => (vec![p.to_string()], vec![pointer::to_json_path(p)]),
            None => (Vec::new(), Vec::new()),
        };
        Self {
            code,
            severity,
            message,
            paths_in_payload,
            json_paths_in_payload,
            schema_path,
            source,
            documentation_url: String::new(),
        }
    }
}
