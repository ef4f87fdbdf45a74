//! Operation graph types.
//!
//! Everything here is immutable once a spec is loaded. The only interior
//! mutability is the memoized schema validator slot on operations and
//! responses, which is filled at most once.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::OnceCell;

use crate::routing::matcher::CompiledPath;
use crate::validation::schema::CompiledSchema;

/// Operation id used when a spec omits `operationId`.
pub const UNKNOWN_OPERATION_ID: &str = "unknownOperationId";

/// HTTP methods an operation can be declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    /// Lower-case name, as used for cache keys and spec path items.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unsupported HTTP method '{}'", s))
    }
}

/// Where a parameter travels in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
}

impl FromStr for ParameterLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(ParameterLocation::Path),
            "query" => Ok(ParameterLocation::Query),
            "header" => Ok(ParameterLocation::Header),
            "body" => Ok(ParameterLocation::Body),
            "formData" => Ok(ParameterLocation::FormData),
            other => Err(format!("unsupported parameter location '{}'", other)),
        }
    }
}

/// A declared operation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    /// JSON-Schema view of the parameter: the `schema` of a body parameter,
    /// otherwise the parameter object without its swagger-only keywords.
    pub schema: Value,
}

impl Parameter {
    /// Declared primitive type of a non-body parameter.
    pub fn value_type(&self) -> Option<&str> {
        self.schema.get("type").and_then(Value::as_str)
    }
}

/// A declared response for one status code (or `default`).
pub struct Response {
    pub status_code: String,
    pub schema: Option<Value>,
    /// Declared response headers keyed by lower-cased name.
    pub headers: BTreeMap<String, Value>,
    pub(crate) validator: OnceCell<Arc<dyn CompiledSchema>>,
}

impl Response {
    pub fn new(
        status_code: impl Into<String>,
        schema: Option<Value>,
        headers: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            status_code: status_code.into(),
            schema,
            headers,
            validator: OnceCell::new(),
        }
    }

    /// Whether a body is expected for this response.
    pub fn expects_body(&self) -> bool {
        self.schema
            .as_ref()
            .is_some_and(|s| s.get("type").and_then(Value::as_str) != Some("file"))
    }

    /// Whether the schema validator has been compiled yet.
    pub fn is_validator_built(&self) -> bool {
        self.validator.initialized()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status_code", &self.status_code)
            .field("has_schema", &self.schema.is_some())
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Spec-level facts shared by all operations of one spec file.
#[derive(Debug, Clone, Default)]
pub struct SpecInfo {
    pub file_path: String,
    pub title: Option<String>,
    /// `info.version`, as written.
    pub api_version: Option<String>,
    /// `x-ms-parameterized-host` template, empty when absent.
    pub host_template: String,
    pub base_path: String,
    /// Provider folder under `data-plane/` in the file path.
    pub data_plane_provider: Option<String>,
    /// The spec's `definitions`, embedded into compiled validators.
    pub definitions: Value,
}

/// One HTTP method + path combination.
pub struct Operation {
    pub operation_id: String,
    pub method: HttpMethod,
    pub path_template: String,
    pub path: Arc<CompiledPath>,
    pub parameters: Vec<Parameter>,
    pub responses: BTreeMap<String, Arc<Response>>,
    /// `x-ms-long-running-operation`.
    pub long_running: bool,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
    pub spec: Arc<SpecInfo>,
    /// Operation object with parameter and response references resolved.
    pub raw: Value,
    /// JSON pointer of the operation inside its spec file.
    pub json_pointer: String,
    pub(crate) request_validator: OnceCell<Arc<dyn CompiledSchema>>,
}

impl Operation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operation_id: impl Into<String>,
        method: HttpMethod,
        path: Arc<CompiledPath>,
        parameters: Vec<Parameter>,
        responses: BTreeMap<String, Arc<Response>>,
        long_running: bool,
        consumes: Vec<String>,
        produces: Vec<String>,
        spec: Arc<SpecInfo>,
        raw: Value,
        json_pointer: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            method,
            path_template: path.template().to_string(),
            path,
            parameters,
            responses,
            long_running,
            consumes,
            produces,
            spec,
            raw,
            json_pointer: json_pointer.into(),
            request_validator: OnceCell::new(),
        }
    }

    /// Response declared for a status code, falling back to `default` for 4xx/5xx.
    pub fn response_for(&self, status_code: &str) -> Option<&Arc<Response>> {
        self.responses.get(status_code).or_else(|| {
            let code: u16 = status_code.parse().ok()?;
            if (400..=599).contains(&code) {
                self.responses.get("default")
            } else {
                None
            }
        })
    }

    pub fn body_parameter(&self) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.location == ParameterLocation::Body)
    }

    /// Whether the request validator has been compiled yet.
    pub fn is_validator_built(&self) -> bool {
        self.request_validator.initialized()
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("operation_id", &self.operation_id)
            .field("method", &self.method)
            .field("path_template", &self.path_template)
            .field("spec", &self.spec.file_path)
            .finish_non_exhaustive()
    }
}

/// A loaded spec file: its shared info plus every operation it declares.
#[derive(Debug)]
pub struct Spec {
    pub info: Arc<SpecInfo>,
    pub operations: Vec<Arc<Operation>>,
}
