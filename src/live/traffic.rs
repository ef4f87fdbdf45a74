//! Recorded traffic shapes.
//!
//! These mirror the wire format of captured request/response pairs:
//! `{ "liveRequest": { url, method, headers?, query?, body? },
//!    "liveResponse": { statusCode, headers?, body? } }`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A captured request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRequest {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl LiveRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: BTreeMap::new(),
            query: None,
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A status code as recorded: numeric or a reason-phrase mnemonic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusCodeValue {
    Number(u16),
    Text(String),
}

impl StatusCodeValue {
    /// Numeric string form, translating mnemonics such as `"NoContent"`.
    ///
    /// Unknown mnemonics are returned unchanged.
    pub fn normalized(&self) -> String {
        match self {
            StatusCodeValue::Number(code) => code.to_string(),
            StatusCodeValue::Text(text) => normalize_status_code(text),
        }
    }
}

impl fmt::Display for StatusCodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCodeValue::Number(code) => write!(f, "{}", code),
            StatusCodeValue::Text(text) => f.write_str(text),
        }
    }
}

/// A captured response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveResponse {
    pub status_code: StatusCodeValue,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl LiveResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code: StatusCodeValue::Number(status_code),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A captured request together with its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponsePair {
    pub live_request: LiveRequest,
    pub live_response: LiveResponse,
}

static REASON_TO_CODE: LazyLock<HashMap<String, u16>> = LazyLock::new(|| {
    (100..=599u16)
        .filter_map(|code| {
            let status = http::StatusCode::from_u16(code).ok()?;
            let reason = status.canonical_reason()?;
            Some((mnemonic_key(reason), code))
        })
        .collect()
});

fn mnemonic_key(text: &str) -> String {
    text.chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect::<String>()
        .to_lowercase()
}

/// Translate a reason-phrase mnemonic into its numeric status code string.
pub fn normalize_status_code(status: &str) -> String {
    let trimmed = status.trim();
    if trimmed.parse::<u16>().is_ok() {
        return trimmed.to_string();
    }
    REASON_TO_CODE
        .get(&mnemonic_key(trimmed))
        .map(|code| code.to_string())
        .unwrap_or_else(|| status.to_string())
}

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Headers re-keyed by lower-cased name.
pub fn lowercase_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect()
}
