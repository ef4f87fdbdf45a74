//! Shared fixtures for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;

use live_validator::config::ValidatorConfig;

#[allow(dead_code)]
pub const API_VERSION: &str = "2021-01-01";
pub const WIDGET_URL: &str = "https://management.azure.com/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Compute/widgets/w1?api-version=2021-01-01";

/// A small resource-manager spec exercising plain, x-ms-paths, multi-segment
/// and long-running operations.
pub fn compute_spec() -> Value {
    let common_params = json!([
        {"name": "subscriptionId", "in": "path", "required": true, "type": "string"},
        {"name": "resourceGroupName", "in": "path", "required": true, "type": "string"},
        {"name": "widgetName", "in": "path", "required": true, "type": "string"},
        {"$ref": "#/parameters/ApiVersionParameter"}
    ]);
    let mut put_params = common_params.clone();
    if let Some(params) = put_params.as_array_mut() {
        params.push(json!({
            "name": "widget", "in": "body", "required": true,
            "schema": {"$ref": "#/definitions/Widget"}
        }));
    }

    json!({
        "swagger": "2.0",
        "info": {"title": "ComputeManagementClient", "version": API_VERSION},
        "host": "management.azure.com",
        "consumes": ["application/json"],
        "produces": ["application/json"],
        "paths": {
            "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.Compute/widgets/{widgetName}": {
                "get": {
                    "operationId": "Widgets_Get",
                    "parameters": common_params,
                    "responses": {
                        "200": {"description": "OK", "schema": {"$ref": "#/definitions/Widget"}},
                        "default": {"description": "Error", "schema": {"$ref": "#/definitions/CloudError"}}
                    }
                },
                "put": {
                    "operationId": "Widgets_CreateOrUpdate",
                    "x-ms-long-running-operation": true,
                    "parameters": put_params,
                    "responses": {
                        "200": {"description": "OK", "schema": {"$ref": "#/definitions/Widget"}},
                        "201": {"description": "Created", "schema": {"$ref": "#/definitions/Widget"}},
                        "202": {"description": "Accepted"}
                    }
                }
            },
            "/subscriptions/{subscriptionId}/providers/Microsoft.Compute/widgets": {
                "get": {
                    "operationId": "Widgets_List",
                    "parameters": [
                        {"name": "subscriptionId", "in": "path", "required": true, "type": "string"},
                        {"$ref": "#/parameters/ApiVersionParameter"}
                    ],
                    "responses": {"200": {"description": "OK"}}
                }
            },
            "/{scope}/providers/Microsoft.Compute/diagnosticSettings/{name}": {
                "get": {
                    "operationId": "DiagnosticSettings_Get",
                    "parameters": [
                        {"name": "scope", "in": "path", "required": true, "type": "string", "x-ms-skip-url-encoding": true},
                        {"name": "name", "in": "path", "required": true, "type": "string"},
                        {"$ref": "#/parameters/ApiVersionParameter"}
                    ],
                    "responses": {"200": {"description": "OK"}}
                }
            }
        },
        "x-ms-paths": {
            "/subscriptions/{subscriptionId}/providers/Microsoft.Compute/widgets?kind=special": {
                "get": {
                    "operationId": "Widgets_ListSpecial",
                    "parameters": [
                        {"name": "subscriptionId", "in": "path", "required": true, "type": "string"},
                        {"name": "kind", "in": "query", "required": true, "type": "string"},
                        {"$ref": "#/parameters/ApiVersionParameter"}
                    ],
                    "responses": {"200": {"description": "OK"}}
                }
            }
        },
        "parameters": {
            "ApiVersionParameter": {
                "name": "api-version", "in": "query", "required": true, "type": "string"
            }
        },
        "definitions": {
            "Widget": {
                "required": ["location"],
                "properties": {
                    "id": {"type": "string", "readOnly": true},
                    "location": {"type": "string"},
                    "properties": {"$ref": "#/definitions/WidgetProperties"}
                }
            },
            "WidgetProperties": {
                "properties": {
                    "state": {"type": "string", "readOnly": true},
                    "size": {"type": "integer"},
                    "provisioningState": {"type": "string", "readOnly": true}
                }
            },
            "CloudError": {
                "properties": {"error": {"type": "object"}}
            }
        }
    })
}

/// A spec corpus on disk laid out the way the public spec repository is.
pub struct Corpus {
    pub dir: TempDir,
}

impl Corpus {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `document` under `relative` and return its full path.
    pub fn write(&self, relative: &str, document: &Value) -> PathBuf {
        self.write_raw(relative, &serde_json::to_string_pretty(document).unwrap())
    }

    pub fn write_raw(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn with_compute_spec() -> Self {
        let corpus = Self::new();
        corpus.write(
            "specification/compute/resource-manager/Microsoft.Compute/stable/2021-01-01/compute.json",
            &compute_spec(),
        );
        corpus
    }

    /// Configuration scanning this corpus with eager validator compilation.
    pub fn config(&self) -> ValidatorConfig {
        let mut config = ValidatorConfig::default();
        config.specs.directory = self.root().to_string_lossy().to_string();
        config.validation.load_validator_in_background = false;
        config.validation.load_validator_in_initialize = true;
        config
    }
}

#[allow(dead_code)]
pub fn widget_put_pair(status: u16, headers: Value, body: Value) -> Value {
    json!({
        "liveRequest": {
            "url": WIDGET_URL,
            "method": "PUT",
            "headers": {"Content-Type": "application/json"},
            "body": {"location": "westus", "properties": {"size": 3}}
        },
        "liveResponse": {"statusCode": status, "headers": headers, "body": body}
    })
}
