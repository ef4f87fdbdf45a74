//! Schema compilation and per-operation validator memoization.
//!
//! # Responsibilities
//! - Abstract the JSON-Schema engine behind [`SchemaValidator`]
//! - Build the request schema (`path`, `query`, `headers`, `body`) of an operation
//! - Build the response schema (`headers`, `body`) of one declared response
//! - Compile each schema at most once, on first use or in the background
//!
//! # Design Decisions
//! - Compiled validators live on the operation/response they belong to, in a
//!   `tokio::sync::OnceCell`, so concurrent first uses share one compilation
//! - The spec's `definitions` are embedded into every root schema, keeping
//!   `#/definitions/...` references resolvable
//! - Draft 4 semantics, matching Swagger 2.0

use std::sync::Arc;
use std::time::Instant;

use jsonschema::error::ValidationErrorKind;
use serde_json::{json, Map, Value};

use crate::observability::metrics;
use crate::pointer;
use crate::spec::{Operation, ParameterLocation, Response};
use crate::validation::issue::IssueCode;

/// One schema violation in engine-neutral form.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIssue {
    pub code: IssueCode,
    /// Pointer into the validated instance. For missing or unexpected
    /// properties this points at the property itself.
    pub instance_pointer: String,
    pub schema_path: String,
    pub message: String,
    /// Missing or unexpected property name, when the code concerns one.
    pub property: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to compile schema: {0}")]
pub struct SchemaError(pub String);

/// A compiled, reusable validator.
pub trait CompiledSchema: Send + Sync {
    fn validate(&self, instance: &Value) -> Vec<SchemaIssue>;
}

/// A JSON-Schema engine.
pub trait SchemaValidator: Send + Sync {
    fn compile(&self, schema: &Value) -> Result<Arc<dyn CompiledSchema>, SchemaError>;
}

/// [`SchemaValidator`] backed by the `jsonschema` crate.
#[derive(Debug, Default, Clone)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn compile(&self, schema: &Value) -> Result<Arc<dyn CompiledSchema>, SchemaError> {
        let validator = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft4)
            .build(schema)
            .map_err(|e| SchemaError(e.to_string()))?;
        Ok(Arc::new(JsonSchema(validator)))
    }
}

struct JsonSchema(jsonschema::Validator);

impl CompiledSchema for JsonSchema {
    fn validate(&self, instance: &Value) -> Vec<SchemaIssue> {
        self.0
            .iter_errors(instance)
            .flat_map(|error| {
                let instance_pointer = error.instance_path.to_string();
                let schema_path = error.schema_path.to_string();
                let message = error.to_string();
                let (code, properties) = classify(&error.kind);
                if properties.is_empty() {
                    vec![SchemaIssue {
                        code,
                        instance_pointer,
                        schema_path,
                        message,
                        property: None,
                    }]
                } else {
                    properties
                        .into_iter()
                        .map(|property| SchemaIssue {
                            code,
                            instance_pointer: pointer::join(&instance_pointer, &property),
                            schema_path: schema_path.clone(),
                            message: message.clone(),
                            property: Some(property),
                        })
                        .collect()
                }
            })
            .collect()
    }
}

/// Map an engine error kind onto an issue code plus the properties it names.
fn classify(kind: &ValidationErrorKind) -> (IssueCode, Vec<String>) {
    match kind {
        ValidationErrorKind::Required { property } => {
            let name = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            (IssueCode::ObjectMissingRequiredProperty, vec![name])
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            (IssueCode::ObjectAdditionalProperties, unexpected.clone())
        }
        ValidationErrorKind::Type { .. } => (IssueCode::InvalidType, Vec::new()),
        ValidationErrorKind::Enum { .. } => (IssueCode::EnumMismatch, Vec::new()),
        ValidationErrorKind::Format { .. } => (IssueCode::InvalidFormat, Vec::new()),
        ValidationErrorKind::Pattern { .. } => (IssueCode::Pattern, Vec::new()),
        ValidationErrorKind::MinLength { .. } => (IssueCode::MinLength, Vec::new()),
        ValidationErrorKind::MaxLength { .. } => (IssueCode::MaxLength, Vec::new()),
        ValidationErrorKind::Minimum { .. } => (IssueCode::Minimum, Vec::new()),
        ValidationErrorKind::Maximum { .. } => (IssueCode::Maximum, Vec::new()),
        ValidationErrorKind::ExclusiveMinimum { .. } => (IssueCode::MinimumExclusive, Vec::new()),
        ValidationErrorKind::ExclusiveMaximum { .. } => (IssueCode::MaximumExclusive, Vec::new()),
        ValidationErrorKind::MultipleOf { .. } => (IssueCode::MultipleOf, Vec::new()),
        ValidationErrorKind::MinItems { .. } => (IssueCode::ArrayLengthShort, Vec::new()),
        ValidationErrorKind::MaxItems { .. } => (IssueCode::ArrayLengthLong, Vec::new()),
        ValidationErrorKind::UniqueItems { .. } => (IssueCode::ArrayUnique, Vec::new()),
        ValidationErrorKind::OneOfNotValid { .. } => (IssueCode::OneOfMissing, Vec::new()),
        ValidationErrorKind::OneOfMultipleValid { .. } => (IssueCode::OneOfMultiple, Vec::new()),
        ValidationErrorKind::AnyOf { .. } => (IssueCode::AnyOfMissing, Vec::new()),
        _ => (IssueCode::Unclassified, Vec::new()),
    }
}

#[derive(Default)]
struct ObjectSchema {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ObjectSchema {
    fn add(&mut self, name: String, schema: Value, required: bool) {
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
    }

    fn into_value(self) -> Value {
        let mut schema = json!({"type": "object", "properties": self.properties});
        // draft 4 rejects an empty `required` array
        if !self.required.is_empty() {
            schema["required"] = json!(self.required);
        }
        schema
    }
}

/// Plain string `api-version` query parameters are checked by operation lookup instead.
fn is_plain_api_version(name: &str, schema: &Value) -> bool {
    name.eq_ignore_ascii_case("api-version")
        && schema.get("type").and_then(Value::as_str) == Some("string")
        && schema.get("enum").is_none()
        && schema.get("pattern").is_none()
}

/// Root request schema of an operation.
pub fn build_request_schema(operation: &Operation) -> Value {
    let mut path = ObjectSchema::default();
    let mut query = ObjectSchema::default();
    let mut headers = ObjectSchema::default();
    let mut root = ObjectSchema::default();

    for parameter in &operation.parameters {
        let schema = parameter.schema.clone();
        match parameter.location {
            ParameterLocation::Path => path.add(parameter.name.clone(), schema, parameter.required),
            ParameterLocation::Query => {
                if !is_plain_api_version(&parameter.name, &schema) {
                    query.add(parameter.name.to_lowercase(), schema, parameter.required);
                }
            }
            ParameterLocation::Header => {
                headers.add(parameter.name.to_lowercase(), schema, parameter.required)
            }
            ParameterLocation::Body => root.add("body".to_string(), schema, parameter.required),
            ParameterLocation::FormData => {}
        }
    }

    root.add("path".to_string(), path.into_value(), false);
    root.add("query".to_string(), query.into_value(), false);
    root.add("headers".to_string(), headers.into_value(), false);
    with_definitions(root.into_value(), operation)
}

/// Root response schema for one declared response.
pub fn build_response_schema(operation: &Operation, response: &Response) -> Value {
    let mut headers = ObjectSchema::default();
    for (name, schema) in &response.headers {
        headers.add(name.clone(), schema.clone(), true);
    }

    let mut root = ObjectSchema::default();
    root.add("headers".to_string(), headers.into_value(), false);
    if response.expects_body() {
        if let Some(schema) = &response.schema {
            root.add("body".to_string(), schema.clone(), true);
        }
    }
    with_definitions(root.into_value(), operation)
}

fn with_definitions(mut schema: Value, operation: &Operation) -> Value {
    schema["definitions"] = operation.spec.definitions.clone();
    schema
}

/// The operation's request validator, compiling it on first use.
pub async fn request_validator(
    operation: &Operation,
    engine: &dyn SchemaValidator,
    mode: &'static str,
) -> Result<Arc<dyn CompiledSchema>, SchemaError> {
    operation
        .request_validator
        .get_or_try_init(|| async {
            let started = Instant::now();
            let compiled = engine.compile(&build_request_schema(operation))?;
            metrics::record_validator_build(mode, started.elapsed());
            tracing::debug!(
                operation_id = %operation.operation_id,
                mode,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Built request validator"
            );
            Ok(compiled)
        })
        .await
        .cloned()
}

/// A response's validator, compiling it on first use.
pub async fn response_validator(
    operation: &Operation,
    response: &Response,
    engine: &dyn SchemaValidator,
    mode: &'static str,
) -> Result<Arc<dyn CompiledSchema>, SchemaError> {
    response
        .validator
        .get_or_try_init(|| async {
            let started = Instant::now();
            let compiled = engine.compile(&build_response_schema(operation, response))?;
            metrics::record_validator_build(mode, started.elapsed());
            tracing::debug!(
                operation_id = %operation.operation_id,
                status_code = %response.status_code,
                mode,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Built response validator"
            );
            Ok(compiled)
        })
        .await
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse_spec;
    use std::path::Path;

    fn operation() -> Arc<Operation> {
        let document = json!({
            "swagger": "2.0",
            "info": {"title": "Foo", "version": "2021-01-01"},
            "paths": {
                "/things/{name}": {
                    "put": {
                        "operationId": "Things_Create",
                        "parameters": [
                            {"name": "name", "in": "path", "required": true, "type": "string"},
                            {"name": "api-version", "in": "query", "required": true, "type": "string"},
                            {"name": "x-ms-Count", "in": "header", "type": "integer"},
                            {"name": "thing", "in": "body", "required": true, "schema": {"$ref": "#/definitions/Thing"}}
                        ],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "schema": {"$ref": "#/definitions/Thing"},
                                "headers": {"ETag": {"type": "string"}}
                            }
                        }
                    }
                }
            },
            "definitions": {
                "Thing": {
                    "type": "object",
                    "required": ["size"],
                    "properties": {"size": {"type": "integer"}},
                    "additionalProperties": false
                }
            }
        });
        parse_spec(Path::new("things.json"), &document)
            .unwrap()
            .operations
            .remove(0)
    }

    #[test]
    fn test_request_schema_shape() {
        let op = operation();
        let schema = build_request_schema(&op);
        assert_eq!(schema["required"], json!(["body"]));
        assert_eq!(schema["properties"]["path"]["required"], json!(["name"]));
        assert!(schema["properties"]["query"]["properties"]
            .get("api-version")
            .is_none());
        assert!(schema["properties"]["query"].get("required").is_none());
        assert!(schema["properties"]["headers"]["properties"]
            .get("x-ms-count")
            .is_some());
        assert!(schema["definitions"].get("Thing").is_some());
    }

    #[test]
    fn test_response_schema_requires_headers_and_body() {
        let op = operation();
        let schema = build_response_schema(&op, &op.responses["200"]);
        assert_eq!(schema["required"], json!(["body"]));
        assert_eq!(schema["properties"]["headers"]["required"], json!(["etag"]));
    }

    #[test]
    fn test_engine_reports_missing_and_additional_properties() {
        let op = operation();
        let compiled = JsonSchemaValidator
            .compile(&build_request_schema(&op))
            .unwrap();
        let issues = compiled.validate(&json!({
            "path": {"name": "t1"},
            "query": {},
            "headers": {},
            "body": {"extra": 1}
        }));
        let codes: Vec<_> = issues.iter().map(|i| (i.code, i.instance_pointer.as_str())).collect();
        assert!(codes.contains(&(IssueCode::ObjectMissingRequiredProperty, "/body/size")));
        assert!(codes.contains(&(IssueCode::ObjectAdditionalProperties, "/body/extra")));
    }

    #[test]
    fn test_engine_reports_type_mismatch() {
        let op = operation();
        let compiled = JsonSchemaValidator
            .compile(&build_request_schema(&op))
            .unwrap();
        let issues = compiled.validate(&json!({
            "path": {"name": "t1"},
            "query": {},
            "headers": {},
            "body": {"size": "big"}
        }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::InvalidType);
        assert_eq!(issues[0].instance_pointer, "/body/size");
    }

    #[tokio::test]
    async fn test_validator_is_memoized() {
        let op = operation();
        assert!(!op.is_validator_built());
        let first = request_validator(&op, &JsonSchemaValidator, "on_demand").await.unwrap();
        assert!(op.is_validator_built());
        let second = request_validator(&op, &JsonSchemaValidator, "on_demand").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
