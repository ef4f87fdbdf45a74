//! Structural JSON diff producing add/remove/replace patch operations.

use serde::Serialize;
use serde_json::Value;

use crate::pointer;

/// One difference between a request body and a response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Present in the response only.
    Add { path: String, value: Value },
    /// Present in the request only.
    Remove {
        path: String,
        #[serde(rename = "oldValue")]
        old_value: Value,
    },
    /// Present in both with different values.
    Replace {
        path: String,
        value: Value,
        #[serde(rename = "oldValue")]
        old_value: Value,
    },
}

impl PatchOperation {
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path, .. }
            | PatchOperation::Replace { path, .. } => path,
        }
    }
}

/// Diff `before` (request) against `after` (response).
///
/// Objects are compared key by key and arrays index by index; anything else
/// that differs becomes a single replace at that location.
pub fn diff(before: &Value, after: &Value) -> Vec<PatchOperation> {
    let mut operations = Vec::new();
    diff_at("", before, after, &mut operations);
    operations
}

fn diff_at(path: &str, before: &Value, after: &Value, out: &mut Vec<PatchOperation>) {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old {
                let child = pointer::join(path, key);
                match new.get(key) {
                    Some(new_value) => diff_at(&child, old_value, new_value, out),
                    None => out.push(PatchOperation::Remove {
                        path: child,
                        old_value: old_value.clone(),
                    }),
                }
            }
            for (key, new_value) in new {
                if !old.contains_key(key) {
                    out.push(PatchOperation::Add {
                        path: pointer::join(path, key),
                        value: new_value.clone(),
                    });
                }
            }
        }
        (Value::Array(old), Value::Array(new)) => {
            for (index, old_value) in old.iter().enumerate() {
                let child = format!("{}/{}", path, index);
                match new.get(index) {
                    Some(new_value) => diff_at(&child, old_value, new_value, out),
                    None => out.push(PatchOperation::Remove {
                        path: child,
                        old_value: old_value.clone(),
                    }),
                }
            }
            for (index, new_value) in new.iter().enumerate().skip(old.len()) {
                out.push(PatchOperation::Add {
                    path: format!("{}/{}", path, index),
                    value: new_value.clone(),
                });
            }
        }
        _ if before != after => out.push(PatchOperation::Replace {
            path: path.to_string(),
            value: after.clone(),
            old_value: before.clone(),
        }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_documents() {
        let doc = json!({"a": [1, {"b": 2}], "c": null});
        assert!(diff(&doc, &doc).is_empty());
    }

    #[test]
    fn test_replace_add_remove() {
        let request = json!({
            "location": "westus",
            "properties": {"state": "A", "secret": "s"}
        });
        let response = json!({
            "location": "westus",
            "id": "/x",
            "properties": {"state": "B"}
        });
        let ops = diff(&request, &response);
        assert_eq!(
            ops,
            vec![
                PatchOperation::Remove {
                    path: "/properties/secret".to_string(),
                    old_value: json!("s"),
                },
                PatchOperation::Replace {
                    path: "/properties/state".to_string(),
                    value: json!("B"),
                    old_value: json!("A"),
                },
                PatchOperation::Add {
                    path: "/id".to_string(),
                    value: json!("/x"),
                },
            ]
        );
    }

    #[test]
    fn test_arrays_by_index() {
        let ops = diff(&json!({"tags": [1, 2, 3]}), &json!({"tags": [1, 5]}));
        let paths: Vec<_> = ops.iter().map(|o| o.path().to_string()).collect();
        assert_eq!(paths, vec!["/tags/1", "/tags/2"]);
        assert!(matches!(ops[0], PatchOperation::Replace { .. }));
        assert!(matches!(ops[1], PatchOperation::Remove { .. }));
    }

    #[test]
    fn test_type_change_is_single_replace() {
        let ops = diff(&json!({"a": {"b": 1}}), &json!({"a": "flat"}));
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path(), "/a");
    }

    #[test]
    fn test_wire_shape() {
        let op = PatchOperation::Replace {
            path: "/a".to_string(),
            value: json!(2),
            old_value: json!(1),
        };
        assert_eq!(
            serde_json::to_value(op).unwrap(),
            json!({"op": "replace", "path": "/a", "value": 2, "oldValue": 1})
        );
    }
}
