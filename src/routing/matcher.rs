//! Path template compilation and matching.
//!
//! # Responsibilities
//! - Compile `host + basePath + path` templates into anchored, case-insensitive regexes
//! - Record which capture group holds which declared parameter
//! - Detect templates whose first path segment may span several URL segments
//! - Split `?key=value` constraints out of templates
//!
//! # Design Decisions
//! - Literal text is escaped, so parentheses or dots in templates never form groups
//! - Every parameter token is a capture group, declared or not; group order equals
//!   token order, which keeps the index → name table dense
//! - A trailing `/`, `#` or `?` after the last segment is tolerated

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

static PARAM_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("static regex"));

const SINGLE_SEGMENT: &str = "([^/#?]+?)";
const MULTI_SEGMENT: &str = "(.*)";

/// Errors produced while compiling a path template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathTemplateError {
    #[error("path template '{template}' has unbalanced braces")]
    AsymmetricBraces { template: String },

    #[error("path template '{template}' produced an invalid pattern: {message}")]
    InvalidPattern { template: String, message: String },
}

/// `?key=value` constraints declared inside a path template.
///
/// A request matches only if every key is present with one of the allowed values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryConstraint {
    entries: BTreeMap<String, Vec<String>>,
}

impl QueryConstraint {
    /// Parse the text after `?` in a path template.
    pub fn parse(query: &str) -> Option<Self> {
        let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            entries
                .entry(key.to_lowercase())
                .or_default()
                .push(value.to_lowercase());
        }
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    /// Whether a (lower-cased) request query satisfies every constraint.
    pub fn is_satisfied_by(&self, query: &BTreeMap<String, String>) -> bool {
        self.entries.iter().all(|(key, allowed)| {
            query
                .get(key)
                .is_some_and(|v| allowed.iter().any(|a| a.eq_ignore_ascii_case(v)))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct CompiledPath {
    template: String,
    regex: Regex,
    /// Capture-group index → parameter name. Index 0 is the whole match.
    param_names: Vec<Option<String>>,
    host_participates: bool,
    multi_segment_first_param: bool,
    query_constraint: Option<QueryConstraint>,
}

impl CompiledPath {
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Whether the request host must be prepended to the path before matching.
    pub fn host_participates(&self) -> bool {
        self.host_participates
    }

    pub fn multi_segment_first_param(&self) -> bool {
        self.multi_segment_first_param
    }

    pub fn query_constraint(&self) -> Option<&QueryConstraint> {
        self.query_constraint.as_ref()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.param_names.iter().flatten().map(String::as_str)
    }

    /// Match a request, returning the raw (still encoded) capture values by group index.
    pub fn captures(&self, host: &str, path: &str) -> Option<Vec<Option<String>>> {
        let target;
        let haystack = if self.host_participates {
            target = format!("{}{}", host, path);
            target.as_str()
        } else {
            path
        };
        self.regex.captures(haystack).map(|caps| {
            caps.iter()
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect()
        })
    }

    /// Pair captured values with parameter names, percent-decoding each value.
    pub fn extract_params(&self, captures: &[Option<String>]) -> BTreeMap<String, String> {
        self.param_names
            .iter()
            .zip(captures)
            .filter_map(|(name, value)| {
                let name = name.as_ref()?;
                let value = value.as_ref()?;
                Some((
                    name.clone(),
                    percent_decode_str(value).decode_utf8_lossy().into_owned(),
                ))
            })
            .collect()
    }
}

/// Compiles spec path templates.
pub struct PathMatcher;

impl PathMatcher {
    /// Compile a template against the spec's host template and base path.
    ///
    /// `declared_path_params` holds the names of parameters declared `in: path`
    /// (host parameters included); only those may span multiple segments.
    pub fn compile(
        host_template: &str,
        base_path: &str,
        path_template: &str,
        declared_path_params: &HashSet<String>,
    ) -> Result<CompiledPath, PathTemplateError> {
        if path_template.matches('{').count() != path_template.matches('}').count() {
            return Err(PathTemplateError::AsymmetricBraces {
                template: path_template.to_string(),
            });
        }

        let host = host_template
            .strip_prefix("https://")
            .or_else(|| host_template.strip_prefix("http://"))
            .unwrap_or(host_template);

        let (path, query_constraint) = match path_template.split_once('?') {
            Some((path, query)) => (path, QueryConstraint::parse(query)),
            None => (path_template, None),
        };
        let path = path.strip_suffix('/').unwrap_or(path);
        let base_path = base_path.strip_suffix('/').unwrap_or(base_path);

        let multi_segment_param = first_segment_param(path)
            .filter(|name| declared_path_params.contains(*name))
            .map(str::to_string);

        let mut pattern = String::from("(?i)^");
        let mut param_names = vec![None];
        push_template(&mut pattern, &mut param_names, host, None);
        push_template(&mut pattern, &mut param_names, base_path, None);
        push_template(
            &mut pattern,
            &mut param_names,
            path,
            multi_segment_param.as_deref(),
        );
        pattern.push_str("[/#?]?$");

        let regex = Regex::new(&pattern).map_err(|e| PathTemplateError::InvalidPattern {
            template: path_template.to_string(),
            message: e.to_string(),
        })?;

        Ok(CompiledPath {
            template: path_template.to_string(),
            regex,
            param_names,
            host_participates: !host.is_empty(),
            multi_segment_first_param: multi_segment_param.is_some(),
            query_constraint,
        })
    }
}

/// Name of the parameter forming the whole first segment, e.g. `scope` in `/{scope}/x`.
fn first_segment_param(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/{")?;
    let end = rest.find('}')?;
    let after = &rest[end + 1..];
    if after.is_empty() || after.starts_with('/') {
        Some(&rest[..end])
    } else {
        None
    }
}

fn push_template(
    pattern: &mut String,
    names: &mut Vec<Option<String>>,
    template: &str,
    multi_segment_param: Option<&str>,
) {
    let mut last = 0;
    for caps in PARAM_TOKEN.captures_iter(template) {
        let (Some(token), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        pattern.push_str(&regex::escape(&template[last..token.start()]));
        let is_multi = token.start() == 1 && multi_segment_param == Some(name.as_str());
        pattern.push_str(if is_multi { MULTI_SEGMENT } else { SINGLE_SEGMENT });
        names.push(Some(name.as_str().to_string()));
        last = token.end();
    }
    pattern.push_str(&regex::escape(&template[last..]));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_single_segment_params() {
        let path = PathMatcher::compile(
            "",
            "",
            "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}",
            &declared(&["subscriptionId", "resourceGroupName"]),
        )
        .unwrap();
        let caps = path
            .captures("management.azure.com", "/subscriptions/s1/resourceGroups/rg1")
            .unwrap();
        let params = path.extract_params(&caps);
        assert_eq!(params["subscriptionId"], "s1");
        assert_eq!(params["resourceGroupName"], "rg1");
        assert!(!path.multi_segment_first_param());
    }

    #[test]
    fn test_case_insensitive_with_trailing_slash() {
        let path = PathMatcher::compile("", "", "/providers/Microsoft.Foo/bars", &HashSet::new())
            .unwrap();
        assert!(path.captures("", "/PROVIDERS/microsoft.foo/BARS/").is_some());
        assert!(path.captures("", "/providers/MicrosoftXFoo/bars").is_none());
        assert!(path.captures("", "/providers/Microsoft.Foo/bars/extra").is_none());
    }

    #[test]
    fn test_multi_segment_first_param() {
        let path = PathMatcher::compile(
            "",
            "",
            "/{scope}/providers/Microsoft.Insights/diagnosticSettings/{name}",
            &declared(&["scope", "name"]),
        )
        .unwrap();
        assert!(path.multi_segment_first_param());
        let caps = path
            .captures(
                "",
                "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Insights/diagnosticSettings/d1",
            )
            .unwrap();
        let params = path.extract_params(&caps);
        assert_eq!(params["scope"], "subscriptions/s1/resourceGroups/rg1");
        assert_eq!(params["name"], "d1");
    }

    #[test]
    fn test_undeclared_first_param_stays_single_segment() {
        let path = PathMatcher::compile("", "", "/{scope}/things", &HashSet::new()).unwrap();
        assert!(!path.multi_segment_first_param());
        assert!(path.captures("", "/a/b/things").is_none());
        assert!(path.captures("", "/a/things").is_some());
    }

    #[test]
    fn test_parentheses_are_literal() {
        let path = PathMatcher::compile(
            "",
            "",
            "/Tables('{tableName}')",
            &declared(&["tableName"]),
        )
        .unwrap();
        let caps = path.captures("", "/Tables('people')").unwrap();
        assert_eq!(path.extract_params(&caps)["tableName"], "people");
    }

    #[test]
    fn test_asymmetric_braces_rejected() {
        let err = PathMatcher::compile("", "", "/things/{id", &HashSet::new()).unwrap_err();
        assert!(matches!(err, PathTemplateError::AsymmetricBraces { .. }));
    }

    #[test]
    fn test_host_template_participates() {
        let path = PathMatcher::compile(
            "https://{accountName}.blob.core.windows.net",
            "",
            "/{containerName}",
            &declared(&["accountName", "containerName"]),
        )
        .unwrap();
        assert!(path.host_participates());
        let caps = path
            .captures("acct.blob.core.windows.net", "/photos")
            .unwrap();
        let params = path.extract_params(&caps);
        assert_eq!(params["accountName"], "acct");
        assert_eq!(params["containerName"], "photos");
    }

    #[test]
    fn test_captured_values_are_decoded() {
        let path = PathMatcher::compile("", "", "/items/{name}", &declared(&["name"])).unwrap();
        let caps = path.captures("", "/items/a%20b").unwrap();
        assert_eq!(path.extract_params(&caps)["name"], "a b");
    }

    #[test]
    fn test_query_constraint() {
        let path = PathMatcher::compile(
            "",
            "",
            "/things?api=Preview&kind=a",
            &HashSet::new(),
        )
        .unwrap();
        let constraint = path.query_constraint().unwrap();
        assert_eq!(constraint.keys().collect::<Vec<_>>(), vec!["api", "kind"]);

        let mut query = BTreeMap::new();
        query.insert("api".to_string(), "preview".to_string());
        assert!(!constraint.is_satisfied_by(&query));
        query.insert("kind".to_string(), "a".to_string());
        assert!(constraint.is_satisfied_by(&query));
        assert!(path.captures("", "/things").is_some());
    }
}
