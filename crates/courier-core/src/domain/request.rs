//! Request descriptor: everything needed to replay a side-effecting call later.

use serde::{Deserialize, Serialize};

/// Serializable description of one HTTP exchange.
///
/// Holds only plain data (no client handle, no cancellation token) so it can
/// be persisted and dispatched again after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTarget {
    /// Absolute URL, or a path resolved against the sender's base URL.
    pub url: String,

    /// HTTP method name (`POST`, `PUT`, `PATCH`, `DELETE`, ...).
    #[serde(default = "default_method")]
    pub method: String,

    /// Header name/value pairs, in insertion order.
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// JSON body (sent with `Content-Type: application/json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

fn default_method() -> String {
    "POST".to_string()
}

impl RequestTarget {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into().to_ascii_uppercase(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new("PUT", url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new("DELETE", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}
