//! Validation results and their wire reports.
//!
//! A result is exactly one of success, a list of issues, or a runtime
//! exception; the tri-state `isSuccessful` of the wire format is derived
//! from that.

use serde::{Deserialize, Serialize};

use crate::routing::request::UNKNOWN_API_VERSION;
use crate::routing::{OperationMatch, ValidationRequest};
use crate::spec::UNKNOWN_OPERATION_ID;
use crate::validation::issue::LiveValidationIssue;

/// Runtime exception codes that are not operation-resolution failures.
pub mod codes {
    pub const INCORRECT_INPUT: &str = "INCORRECT_INPUT";
    pub const REQUEST_VALIDATION_ERROR: &str = "REQUEST_VALIDATION_ERROR";
    pub const RESPONSE_VALIDATION_ERROR: &str = "RESPONSE_VALIDATION_ERROR";
    pub const ROUNDTRIP_VALIDATION_ERROR: &str = "ROUNDTRIP_VALIDATION_ERROR";
}

/// A failure that prevented validation from running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeException {
    pub code: String,
    pub message: String,
}

impl RuntimeException {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Success,
    Failures(Vec<LiveValidationIssue>),
    RuntimeException(RuntimeException),
}

/// What a validation call resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationContext {
    pub operation_id: String,
    pub api_version: String,
    pub validation_request: Option<ValidationRequest>,
    pub operation_match: Option<OperationMatch>,
}

impl OperationContext {
    pub fn unknown() -> Self {
        Self {
            operation_id: UNKNOWN_OPERATION_ID.to_string(),
            api_version: UNKNOWN_API_VERSION.to_string(),
            validation_request: None,
            operation_match: None,
        }
    }

    /// Drop the lookup key and match, keeping only the identifying fields.
    pub fn without_match(self) -> Self {
        Self {
            validation_request: None,
            operation_match: None,
            ..self
        }
    }
}

/// Identifying fields of the resolved operation, as reported on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    pub operation_id: String,
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveValidationResult {
    pub operation_info: OperationContext,
    pub outcome: ValidationOutcome,
}

impl LiveValidationResult {
    pub fn from_issues(operation_info: OperationContext, issues: Vec<LiveValidationIssue>) -> Self {
        let outcome = if issues.is_empty() {
            ValidationOutcome::Success
        } else {
            ValidationOutcome::Failures(issues)
        };
        Self {
            operation_info,
            outcome,
        }
    }

    pub fn runtime(operation_info: OperationContext, exception: RuntimeException) -> Self {
        Self {
            operation_info,
            outcome: ValidationOutcome::RuntimeException(exception),
        }
    }

    /// `Some(true)` valid, `Some(false)` issues found, `None` not validated.
    pub fn is_successful(&self) -> Option<bool> {
        match &self.outcome {
            ValidationOutcome::Success => Some(true),
            ValidationOutcome::Failures(_) => Some(false),
            ValidationOutcome::RuntimeException(_) => None,
        }
    }

    pub fn issues(&self) -> &[LiveValidationIssue] {
        match &self.outcome {
            ValidationOutcome::Failures(issues) => issues,
            _ => &[],
        }
    }

    pub fn runtime_exception(&self) -> Option<&RuntimeException> {
        match &self.outcome {
            ValidationOutcome::RuntimeException(e) => Some(e),
            _ => None,
        }
    }

    pub fn to_report(&self) -> LiveValidationReport {
        LiveValidationReport {
            is_successful: self.is_successful(),
            operation_info: OperationInfo {
                operation_id: self.operation_info.operation_id.clone(),
                api_version: self.operation_info.api_version.clone(),
            },
            errors: self.issues().to_vec(),
            runtime_exception: self.runtime_exception().cloned(),
        }
    }
}

/// Wire form of a [`LiveValidationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveValidationReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_successful: Option<bool>,
    pub operation_info: OperationInfo,
    pub errors: Vec<LiveValidationIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_exception: Option<RuntimeException>,
}

/// Results of validating a request/response pair together.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResponseValidationResult {
    pub request_validation_result: LiveValidationResult,
    pub response_validation_result: LiveValidationResult,
    /// Set when the pair itself was malformed.
    pub runtime_exception: Option<RuntimeException>,
}

impl RequestResponseValidationResult {
    pub fn is_successful(&self) -> Option<bool> {
        match (
            self.request_validation_result.is_successful(),
            self.response_validation_result.is_successful(),
        ) {
            (Some(request), Some(response)) => Some(request && response),
            _ => None,
        }
    }

    pub fn to_report(&self) -> RequestResponseReport {
        RequestResponseReport {
            request_validation_result: self.request_validation_result.to_report(),
            response_validation_result: self.response_validation_result.to_report(),
            runtime_exception: self.runtime_exception.clone(),
        }
    }
}

/// Wire form of a [`RequestResponseValidationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponseReport {
    pub request_validation_result: LiveValidationReport,
    pub response_validation_result: LiveValidationReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_exception: Option<RuntimeException>,
}
