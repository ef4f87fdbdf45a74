//! Schema attribute extraction for round-trip checks.
//!
//! # Responsibilities
//! - Walk an operation's parameter and response schemas for `readOnly`,
//!   `x-ms-secret`, `default` and `x-ms-mutability`
//! - Rewrite each located schema pointer into a body-level payload pattern
//! - Cache the result per (provider, api-version, operation id)
//!
//! # Design Decisions
//! - `$ref`s into `definitions` are followed with a cycle guard on the active
//!   reference chain, so recursive models terminate
//! - Patterns use `*` for array items and map values
//! - Concurrent first lookups of one key may both extract; the results are
//!   identical and the first insert wins

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::pointer;
use crate::spec::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    ReadOnly,
    Secret,
    Default,
    Mutability,
}

/// Whether an attribute was declared on the request or a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Parameter(String),
    Response(String),
}

/// Which declarations a lookup considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction<'a> {
    Any,
    Parameters,
    Response(&'a str),
}

impl Direction<'_> {
    fn admits(&self, origin: &Origin) -> bool {
        match (self, origin) {
            (Direction::Any, _) => true,
            (Direction::Parameters, Origin::Parameter(_)) => true,
            (Direction::Response(code), Origin::Response(declared)) => *code == declared.as_str(),
            _ => false,
        }
    }
}

/// One place an attribute is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeLocation {
    pub origin: Origin,
    /// Payload pattern, e.g. `/properties/tags/*`.
    pub pattern: String,
    /// `x-ms-mutability` values; empty for other kinds.
    pub mutability: Vec<String>,
}

/// Every attribute declaration of one operation.
#[derive(Debug, Default)]
pub struct OperationAttributes {
    locations: HashMap<AttributeKind, Vec<AttributeLocation>>,
}

impl OperationAttributes {
    pub fn extract(operation: &Operation) -> Self {
        let mut walker = Walker {
            definitions: &operation.spec.definitions,
            found: Vec::new(),
            ref_chain: Vec::new(),
        };

        if let Some(parameters) = operation.raw.get("parameters").and_then(Value::as_array) {
            for (index, parameter) in parameters.iter().enumerate() {
                let at = format!("/parameters/{}", index);
                if parameter.get("in").and_then(Value::as_str) == Some("body") {
                    if let Some(schema) = parameter.get("schema") {
                        walker.walk(schema, &format!("{}/schema", at));
                    }
                } else {
                    walker.walk(parameter, &at);
                }
            }
        }
        if let Some(responses) = operation.raw.get("responses").and_then(Value::as_object) {
            for (code, response) in responses {
                if let Some(schema) = response.get("schema") {
                    let at = pointer::join(&pointer::join("/responses", code), "schema");
                    walker.walk(schema, &at);
                }
            }
        }

        let mut locations: HashMap<AttributeKind, Vec<AttributeLocation>> = HashMap::new();
        for (kind, raw_pointer, value) in walker.found {
            let Some((origin, pattern)) = rewrite_pointer(&raw_pointer, &operation.raw) else {
                continue;
            };
            let mutability = match kind {
                AttributeKind::Mutability => value
                    .as_array()
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_ascii_lowercase)
                            .collect()
                    })
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            locations.entry(kind).or_default().push(AttributeLocation {
                origin,
                pattern,
                mutability,
            });
        }
        Self { locations }
    }

    pub fn locations(&self, kind: AttributeKind) -> &[AttributeLocation] {
        self.locations.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Declared exactly at `payload_pointer`.
    pub fn has(&self, kind: AttributeKind, payload_pointer: &str, direction: Direction<'_>) -> bool {
        self.find(kind, payload_pointer, direction).is_some()
    }

    /// Declared at `payload_pointer` or any ancestor of it.
    pub fn covers(
        &self,
        kind: AttributeKind,
        payload_pointer: &str,
        direction: Direction<'_>,
    ) -> bool {
        ancestors(payload_pointer).any(|p| self.has(kind, &p, direction))
    }

    /// Mutability of the nearest declaring location, the pointer itself first.
    pub fn mutability(&self, payload_pointer: &str, direction: Direction<'_>) -> Option<&[String]> {
        ancestors(payload_pointer).find_map(|p| {
            self.find(AttributeKind::Mutability, &p, direction)
                .map(|location| location.mutability.as_slice())
        })
    }

    fn find(
        &self,
        kind: AttributeKind,
        payload_pointer: &str,
        direction: Direction<'_>,
    ) -> Option<&AttributeLocation> {
        self.locations(kind).iter().find(|location| {
            direction.admits(&location.origin) && pattern_matches(&location.pattern, payload_pointer)
        })
    }
}

/// `pointer` followed by each of its ancestors, excluding the root.
fn ancestors(pointer: &str) -> impl Iterator<Item = String> + '_ {
    let mut current = Some(pointer.to_string());
    std::iter::from_fn(move || {
        let this = current.take().filter(|p| !p.is_empty())?;
        current = this.rfind('/').map(|i| this[..i].to_string());
        Some(this)
    })
}

fn pattern_matches(pattern: &str, payload_pointer: &str) -> bool {
    let pattern = pointer::segments(pattern);
    let actual = pointer::segments(payload_pointer);
    pattern.len() == actual.len()
        && pattern
            .iter()
            .zip(&actual)
            .all(|(p, a)| p == "*" || p == a)
}

/// Rewrite a schema-location pointer inside the operation into a payload pattern.
///
/// `/parameters/<N>/schema/...` of a body parameter maps onto the body root,
/// other parameters onto `/<name>/...`; `/responses/<code>/schema/...` maps
/// onto the response body root. Within the schema, `properties/<name>`
/// becomes `<name>`, `items` and `additionalProperties` become `*`, and
/// `allOf/<i>` disappears.
pub fn rewrite_pointer(raw_pointer: &str, operation_raw: &Value) -> Option<(Origin, String)> {
    let segments = pointer::segments(raw_pointer);
    let (origin, prefix, rest) = match segments.first().map(String::as_str) {
        Some("parameters") => {
            let index: usize = segments.get(1)?.parse().ok()?;
            let parameter = operation_raw.get("parameters")?.get(index)?;
            let name = parameter.get("name")?.as_str()?.to_string();
            if parameter.get("in").and_then(Value::as_str) == Some("body") {
                if segments.get(2).map(String::as_str) != Some("schema") {
                    return None;
                }
                (Origin::Parameter(name), String::new(), &segments[3..])
            } else {
                let prefix = pointer::join("", &name);
                (Origin::Parameter(name), prefix, &segments[2..])
            }
        }
        Some("responses") => {
            let code = segments.get(1)?.clone();
            if segments.get(2).map(String::as_str) != Some("schema") {
                return None;
            }
            (Origin::Response(code), String::new(), &segments[3..])
        }
        _ => return None,
    };

    let mut pattern = prefix;
    let mut iter = rest.iter();
    while let Some(segment) = iter.next() {
        match segment.as_str() {
            "properties" => pattern = pointer::join(&pattern, iter.next()?),
            "items" | "additionalProperties" => pattern.push_str("/*"),
            "allOf" => {
                iter.next()?;
            }
            _ => return None,
        }
    }
    Some((origin, pattern))
}

struct Walker<'a> {
    definitions: &'a Value,
    found: Vec<(AttributeKind, String, Value)>,
    ref_chain: Vec<String>,
}

impl<'a> Walker<'a> {
    fn walk(&mut self, schema: &Value, at: &str) {
        let Some(object) = schema.as_object() else {
            return;
        };

        if object.get("readOnly") == Some(&Value::Bool(true)) {
            self.found.push((AttributeKind::ReadOnly, at.to_string(), Value::Bool(true)));
        }
        if object.get("x-ms-secret") == Some(&Value::Bool(true)) {
            self.found.push((AttributeKind::Secret, at.to_string(), Value::Bool(true)));
        }
        if let Some(default) = object.get("default") {
            self.found.push((AttributeKind::Default, at.to_string(), default.clone()));
        }
        if let Some(mutability) = object.get("x-ms-mutability").filter(|m| m.is_array()) {
            self.found.push((AttributeKind::Mutability, at.to_string(), mutability.clone()));
        }

        if let Some(reference) = object.get("$ref").and_then(Value::as_str) {
            if !self.ref_chain.iter().any(|r| r == reference) {
                if let Some(target) = self.lookup(reference) {
                    self.ref_chain.push(reference.to_string());
                    self.walk(target, at);
                    self.ref_chain.pop();
                }
            }
        }

        if let Some(properties) = object.get("properties").and_then(Value::as_object) {
            let base = pointer::join(at, "properties");
            for (name, property) in properties {
                self.walk(property, &pointer::join(&base, name));
            }
        }
        if let Some(items) = object.get("items").filter(|i| i.is_object()) {
            self.walk(items, &pointer::join(at, "items"));
        }
        if let Some(values) = object.get("additionalProperties").filter(|a| a.is_object()) {
            self.walk(values, &pointer::join(at, "additionalProperties"));
        }
        if let Some(all_of) = object.get("allOf").and_then(Value::as_array) {
            for (index, branch) in all_of.iter().enumerate() {
                self.walk(branch, &format!("{}/allOf/{}", at, index));
            }
        }
    }

    fn lookup(&self, reference: &str) -> Option<&'a Value> {
        let name = reference.strip_prefix("#/definitions/")?;
        let definitions: &'a Value = self.definitions;
        definitions.get(pointer::unescape(name))
    }
}

/// Key of one operation's cached attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeKey {
    pub provider: String,
    pub api_version: String,
    pub operation_id: String,
}

/// Lazily populated, shared attribute cache.
#[derive(Debug, Default, Clone)]
pub struct AttributeCache {
    entries: Arc<DashMap<AttributeKey, Arc<OperationAttributes>>>,
}

impl AttributeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_extract(&self, key: AttributeKey, operation: &Operation) -> Arc<OperationAttributes> {
        if let Some(found) = self.entries.get(&key) {
            return Arc::clone(found.value());
        }
        let extracted = Arc::new(OperationAttributes::extract(operation));
        tracing::debug!(
            provider = %key.provider,
            api_version = %key.api_version,
            operation_id = %key.operation_id,
            "Extracted round-trip attributes"
        );
        Arc::clone(self.entries.entry(key).or_insert(extracted).value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
