//! Swagger 2.0 spec loading.
//!
//! # Responsibilities
//! - Read and parse spec files off the async runtime
//! - Resolve parameter and response references (local and relative-file)
//! - Merge path-level and operation-level parameters
//! - Compile every operation's path template
//! - Derive the data-plane provider folder from the spec file path
//!
//! # Design Decisions
//! - The loader is a trait so tests and embedders can supply their own corpus
//! - A broken operation is skipped with a warning; a broken file fails as a whole
//! - Schema `$ref`s into `definitions` are left in place; compiled validators
//!   embed the spec's definitions instead

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::pointer;
use crate::routing::matcher::PathMatcher;
use crate::spec::types::{
    HttpMethod, Operation, Parameter, ParameterLocation, Response, Spec, SpecInfo,
    UNKNOWN_OPERATION_ID,
};

static DATA_PLANE_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/data-plane/([^/]+)/").expect("static regex"));

const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Keywords of a non-body parameter that are not JSON-Schema.
const PARAMETER_ONLY_KEYWORDS: [&str; 4] = ["in", "name", "required", "description"];

/// Error type for spec loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read spec {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse spec {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("spec {path} is not a Swagger 2.0 document")]
    NotSwagger { path: String },

    #[error("spec loading task failed: {0}")]
    Task(String),
}

/// Source of parsed specs.
#[async_trait]
pub trait SpecLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Spec, LoadError>;
}

/// Loads Swagger 2.0 JSON documents from the local filesystem.
#[derive(Debug, Default, Clone)]
pub struct JsonSpecLoader;

#[async_trait]
impl SpecLoader for JsonSpecLoader {
    async fn load(&self, path: &Path) -> Result<Spec, LoadError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || load_spec_file(&path))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?
    }
}

/// Read and parse one spec file.
pub fn load_spec_file(path: &Path) -> Result<Spec, LoadError> {
    let display = path.to_string_lossy().to_string();
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    let document: Value = serde_json::from_str(&content).map_err(|source| LoadError::Json {
        path: display,
        source,
    })?;
    parse_spec(path, &document)
}

/// Build the operation graph of an already-parsed document.
pub fn parse_spec(path: &Path, document: &Value) -> Result<Spec, LoadError> {
    let file_path = path.to_string_lossy().replace('\\', "/");
    if document.get("swagger").and_then(Value::as_str) != Some("2.0") {
        return Err(LoadError::NotSwagger { path: file_path });
    }

    let mut resolver = RefResolver::new(path, document);

    let host_template = document
        .pointer("/x-ms-parameterized-host/hostTemplate")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let host_params: Vec<Value> = document
        .pointer("/x-ms-parameterized-host/parameters")
        .and_then(Value::as_array)
        .map(|params| params.iter().filter_map(|p| resolver.resolve(p)).collect())
        .unwrap_or_default();

    let base_path = document
        .get("basePath")
        .and_then(Value::as_str)
        .map(|b| b.trim_end_matches('/').to_string())
        .unwrap_or_default();

    let info = Arc::new(SpecInfo {
        title: document
            .pointer("/info/title")
            .and_then(Value::as_str)
            .map(str::to_string),
        api_version: document
            .pointer("/info/version")
            .and_then(Value::as_str)
            .map(str::to_string),
        host_template,
        base_path,
        data_plane_provider: folder_provider(&DATA_PLANE_FOLDER, &file_path),
        definitions: document
            .get("definitions")
            .cloned()
            .unwrap_or_else(|| json!({})),
        file_path,
    });

    let context = SpecContext {
        info: Arc::clone(&info),
        host_param_names: names_in_path(&host_params),
        consumes: string_list(document.get("consumes"))
            .unwrap_or_else(|| vec![DEFAULT_MEDIA_TYPE.to_string()]),
        produces: string_list(document.get("produces"))
            .unwrap_or_else(|| vec![DEFAULT_MEDIA_TYPE.to_string()]),
    };

    let mut operations = Vec::new();
    for section in ["paths", "x-ms-paths"] {
        let Some(paths) = document.get(section).and_then(Value::as_object) else {
            continue;
        };
        for (template, item) in paths {
            let path_params: Vec<Value> = item
                .get("parameters")
                .and_then(Value::as_array)
                .map(|params| params.iter().filter_map(|p| resolver.resolve(p)).collect())
                .unwrap_or_default();

            for method in HttpMethod::ALL {
                let Some(raw) = item.get(method.as_str()) else {
                    continue;
                };
                let location = OperationLocation {
                    section,
                    template,
                    method,
                };
                match build_operation(&context, &mut resolver, &location, &path_params, raw) {
                    Ok(operation) => operations.push(Arc::new(operation)),
                    Err(message) => tracing::warn!(
                        spec = %info.file_path,
                        path = %template,
                        method = %method,
                        error = %message,
                        "Skipping operation"
                    ),
                }
            }
        }
    }

    tracing::debug!(
        spec = %info.file_path,
        operations = operations.len(),
        "Parsed spec"
    );

    Ok(Spec { info, operations })
}

struct SpecContext {
    info: Arc<SpecInfo>,
    host_param_names: HashSet<String>,
    consumes: Vec<String>,
    produces: Vec<String>,
}

struct OperationLocation<'a> {
    section: &'a str,
    template: &'a str,
    method: HttpMethod,
}

fn build_operation(
    context: &SpecContext,
    resolver: &mut RefResolver<'_>,
    location: &OperationLocation<'_>,
    path_params: &[Value],
    raw: &Value,
) -> Result<Operation, String> {
    let own_params: Vec<Value> = raw
        .get("parameters")
        .and_then(Value::as_array)
        .map(|params| params.iter().filter_map(|p| resolver.resolve(p)).collect())
        .unwrap_or_default();
    let merged = merge_parameters(path_params, own_params);

    let mut declared = context.host_param_names.clone();
    declared.extend(names_in_path(&merged));
    let compiled = PathMatcher::compile(
        &context.info.host_template,
        &context.info.base_path,
        location.template,
        &declared,
    )
    .map_err(|e| e.to_string())?;

    let parameters = merged.iter().filter_map(parameter_from_value).collect();

    let mut resolved_responses = Map::new();
    let mut responses = BTreeMap::new();
    if let Some(declared_responses) = raw.get("responses").and_then(Value::as_object) {
        for (code, response) in declared_responses {
            let Some(response) = resolver.resolve(response) else {
                continue;
            };
            responses.insert(code.clone(), Arc::new(response_from_value(code, &response)));
            resolved_responses.insert(code.clone(), response);
        }
    }

    let mut resolved = raw.clone();
    if let Some(object) = resolved.as_object_mut() {
        object.insert("parameters".to_string(), Value::Array(merged));
        object.insert("responses".to_string(), Value::Object(resolved_responses));
    }

    Ok(Operation::new(
        raw.get("operationId")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_OPERATION_ID),
        location.method,
        Arc::new(compiled),
        parameters,
        responses,
        raw.get("x-ms-long-running-operation")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        string_list(raw.get("consumes")).unwrap_or_else(|| context.consumes.clone()),
        string_list(raw.get("produces")).unwrap_or_else(|| context.produces.clone()),
        Arc::clone(&context.info),
        resolved,
        format!(
            "/{}/{}/{}",
            location.section,
            pointer::escape(location.template),
            location.method
        ),
    ))
}

/// Operation-level parameters override path-level ones with the same name and location.
fn merge_parameters(path_level: &[Value], own: Vec<Value>) -> Vec<Value> {
    let key = |p: &Value| {
        (
            p.get("name").and_then(Value::as_str).map(str::to_string),
            p.get("in").and_then(Value::as_str).map(str::to_string),
        )
    };
    let overridden: HashSet<_> = own.iter().map(key).collect();
    path_level
        .iter()
        .filter(|p| !overridden.contains(&key(p)))
        .cloned()
        .chain(own)
        .collect()
}

fn parameter_from_value(value: &Value) -> Option<Parameter> {
    let name = value.get("name")?.as_str()?.to_string();
    let location: ParameterLocation = value.get("in")?.as_str()?.parse().ok()?;
    let required = value
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(location == ParameterLocation::Path);
    let schema = if location == ParameterLocation::Body {
        value.get("schema").cloned().unwrap_or_else(|| json!({}))
    } else {
        let mut object = value.as_object().cloned().unwrap_or_default();
        for keyword in PARAMETER_ONLY_KEYWORDS {
            object.remove(keyword);
        }
        Value::Object(object)
    };
    Some(Parameter {
        name,
        location,
        required,
        schema,
    })
}

fn response_from_value(code: &str, value: &Value) -> Response {
    let headers = value
        .get("headers")
        .and_then(Value::as_object)
        .map(|headers| {
            headers
                .iter()
                .map(|(name, schema)| {
                    let mut schema = schema.clone();
                    if let Some(object) = schema.as_object_mut() {
                        object.remove("description");
                    }
                    (name.to_lowercase(), schema)
                })
                .collect()
        })
        .unwrap_or_default();
    Response::new(code, value.get("schema").cloned(), headers)
}

fn names_in_path(params: &[Value]) -> HashSet<String> {
    params
        .iter()
        .filter(|p| p.get("in").and_then(Value::as_str) == Some("path"))
        .filter_map(|p| p.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let list: Vec<String> = value?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    (!list.is_empty()).then_some(list)
}

fn folder_provider(pattern: &Regex, file_path: &str) -> Option<String> {
    pattern
        .captures(file_path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|folder| folder.contains('.'))
        .map(str::to_string)
}

/// Resolves `$ref` objects against the spec itself or sibling files.
struct RefResolver<'a> {
    root: &'a Value,
    base_dir: PathBuf,
    spec_path: String,
    external: HashMap<PathBuf, Option<Value>>,
}

impl<'a> RefResolver<'a> {
    fn new(path: &Path, root: &'a Value) -> Self {
        Self {
            root,
            base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            spec_path: path.to_string_lossy().to_string(),
            external: HashMap::new(),
        }
    }

    /// The value itself, or what its `$ref` points at. `None` when unresolvable.
    fn resolve(&mut self, value: &Value) -> Option<Value> {
        let Some(reference) = value.get("$ref").and_then(Value::as_str) else {
            return Some(value.clone());
        };
        let (file, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let target = if file.is_empty() {
            self.root.pointer(fragment).cloned()
        } else {
            let path = self.base_dir.join(file);
            self.external
                .entry(path.clone())
                .or_insert_with(|| read_json(&path))
                .as_ref()
                .and_then(|document| document.pointer(fragment))
                .cloned()
        };
        if target.is_none() {
            tracing::warn!(
                spec = %self.spec_path,
                reference = %reference,
                "Unresolved reference"
            );
        }
        target
    }
}

fn read_json(path: &Path) -> Option<Value> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
