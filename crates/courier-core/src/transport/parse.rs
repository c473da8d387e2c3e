//! Turn a terminal response into a structured `HttpError`.

use serde_json::Value;

use super::error::{HttpError, HttpResponse};

/// Longest plain-text body kept as an error message.
const MAX_TEXT_MESSAGE: usize = 500;

/// Parse a non-success response body.
///
/// JSON bodies contribute `message` (or `error`), `code` and `details`; a
/// plain-text body becomes the message; an empty or useless body falls back
/// to the status line (`HTTP 503 Service Unavailable`).
pub fn parse_error_response(response: &HttpResponse) -> HttpError {
    let status = response.status;
    let text = String::from_utf8_lossy(&response.body);
    let text = text.trim();

    let mut error = HttpError {
        status,
        message: String::new(),
        code: None,
        details: None,
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => {
            error.message = ["message", "error"]
                .iter()
                .find_map(|k| map.get(*k).and_then(message_text))
                .unwrap_or_default();
            error.code = map.get("code").and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            error.details = map.get("details").filter(|v| !v.is_null()).cloned();
        }
        Ok(Value::String(s)) => error.message = s,
        _ if !text.is_empty() => {
            error.message = text.chars().take(MAX_TEXT_MESSAGE).collect();
        }
        _ => {}
    }

    if error.message.is_empty() {
        error.message = status_line(status);
    }
    error
}

/// `message` may be a string or, for some validation endpoints, a list of strings.
fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(inner) => inner.get("message").and_then(message_text),
        _ => None,
    }
}

fn status_line(status: u16) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason());
    match reason {
        Some(reason) => format!("HTTP {status} {reason}"),
        None => format!("HTTP {status}"),
    }
}
