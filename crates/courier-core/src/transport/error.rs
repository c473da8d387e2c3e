//! Transport error and response types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw response of one exchange. Any status counts as "a response arrived".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON. An empty body is `Null`.
    pub fn json(&self) -> Result<serde_json::Value, TransportError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Parse(e.to_string()))
    }
}

/// Is this status worth another attempt? (server trouble or rate limiting)
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Structured form of a terminal (non-success) response.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("HTTP {status}: {message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
    /// Machine-readable code from the response body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Failure of a transport call, already classified.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No response was received (connection refused, DNS, reset, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The attempt exceeded its deadline and was aborted.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A terminal response was received.
    #[error(transparent)]
    Http(HttpError),

    /// The response body could not be parsed.
    #[error("malformed response body: {0}")]
    Parse(String),

    /// The request descriptor itself is unusable (bad method, bad URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Network failures, timeouts, 5xx and 429 are transient; everything else
    /// would fail the same way on the next attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) | TransportError::Timeout(_) => true,
            TransportError::Http(e) => is_retryable_status(e.status),
            TransportError::Parse(_) | TransportError::InvalidRequest(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http(e) => Some(e.status),
            _ => None,
        }
    }
}
