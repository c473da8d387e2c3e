//! Error classifier: transport failures -> taxonomy buckets -> user-facing text.
//!
//! Purely presentational. The queue's control flow depends on
//! `TransportError::is_retryable`, never on anything in this module.

mod operation;
mod resource;

pub use operation::{OperationOverlay, friendly_for_operation, overlay_for};
pub use resource::ResourceKind;

use serde::{Deserialize, Serialize};

use crate::domain::FailedOperation;
use crate::transport::TransportError;

/// Taxonomy bucket of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    SessionExpired,
    Forbidden,
    NotFound,
    Conflict,
    PayloadTooLarge,
    Validation,
    RateLimited,
    ServerError,
    Network,
    Unknown,
}

impl ErrorCategory {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCategory::SessionExpired,
            403 => ErrorCategory::Forbidden,
            404 => ErrorCategory::NotFound,
            409 => ErrorCategory::Conflict,
            413 => ErrorCategory::PayloadTooLarge,
            400 | 422 => ErrorCategory::Validation,
            429 => ErrorCategory::RateLimited,
            500..=599 => ErrorCategory::ServerError,
            _ => ErrorCategory::Unknown,
        }
    }
}

/// A raw failure mapped into a bucket, keeping the status and server message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub status: Option<u16>,
    pub message: String,
    pub retryable: bool,
}

pub fn classify(error: &TransportError) -> ClassifiedError {
    let category = match error {
        TransportError::Network(_) | TransportError::Timeout(_) => ErrorCategory::Network,
        TransportError::Http(e) => ErrorCategory::from_status(e.status),
        TransportError::Parse(_) | TransportError::InvalidRequest(_) => ErrorCategory::Unknown,
    };
    let message = match error {
        TransportError::Http(e) => e.message.clone(),
        other => other.to_string(),
    };
    ClassifiedError {
        category,
        status: error.status(),
        message,
        retryable: error.is_retryable(),
    }
}

impl ClassifiedError {
    /// Re-classify a persisted failure. A transient failure without a status
    /// never got an answer from the server, so it lands in `Network`.
    pub fn from_failed(failed: &FailedOperation) -> Self {
        let category = match failed.status {
            Some(status) => ErrorCategory::from_status(status),
            None if failed.retryable => ErrorCategory::Network,
            None => ErrorCategory::Unknown,
        };
        // undo the "HTTP {status}: " prefix added by `HttpError`'s Display
        let message = match failed.status {
            Some(status) => failed
                .error
                .strip_prefix(&format!("HTTP {status}: "))
                .unwrap_or(&failed.error),
            None => &failed.error,
        };
        Self {
            category,
            status: failed.status,
            message: message.to_string(),
            retryable: failed.retryable
                || failed.status.is_some_and(crate::transport::is_retryable_status),
        }
    }
}

/// What the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendlyError {
    pub title: String,
    pub message: String,
    pub action: String,
    pub retryable: bool,
}

/// Base friendly mapping, with optional resource context for not-found errors.
pub fn friendly(error: &TransportError, resource: Option<ResourceKind>) -> FriendlyError {
    friendly_classified(&classify(error), resource)
}

pub fn friendly_classified(
    classified: &ClassifiedError,
    resource: Option<ResourceKind>,
) -> FriendlyError {
    let (title, message, action) = match classified.category {
        ErrorCategory::SessionExpired => (
            "Session Expired",
            "Your session has expired.".to_string(),
            "Sign in again to continue.",
        ),
        ErrorCategory::Forbidden => (
            "Access Denied",
            "You don't have permission to do this.".to_string(),
            "Ask the owner for access, or switch accounts.",
        ),
        ErrorCategory::NotFound => (
            "Not Found",
            resource
                .map(|r| r.not_found_message().to_string())
                .unwrap_or_else(|| "The item you're looking for doesn't exist.".to_string()),
            "Go back and refresh the list.",
        ),
        ErrorCategory::Conflict => (
            "Conflict",
            "This item was changed somewhere else.".to_string(),
            "Reload to get the latest version, then try again.",
        ),
        ErrorCategory::PayloadTooLarge => (
            "Too Large",
            "The data you sent is too large.".to_string(),
            "Reduce the size (for example, a smaller image) and try again.",
        ),
        ErrorCategory::Validation => (
            "Invalid Input",
            server_message_or(classified, "Some of the information isn't valid."),
            "Check the highlighted fields and try again.",
        ),
        ErrorCategory::RateLimited => (
            "Too Many Requests",
            "You're doing that too often.".to_string(),
            "Wait a moment and try again.",
        ),
        ErrorCategory::ServerError => (
            "Server Error",
            "Something went wrong on our side.".to_string(),
            "Try again in a few minutes.",
        ),
        ErrorCategory::Network => (
            "Connection Problem",
            "We couldn't reach the server.".to_string(),
            "Check your internet connection. Changes are kept and sent when you're back online.",
        ),
        ErrorCategory::Unknown => (
            "Something Went Wrong",
            server_message_or(classified, "An unexpected error occurred."),
            "Try again. If it keeps happening, contact support.",
        ),
    };
    FriendlyError {
        title: title.to_string(),
        message,
        action: action.to_string(),
        retryable: classified.retryable,
    }
}

fn server_message_or(classified: &ClassifiedError, fallback: &str) -> String {
    // status-line fallbacks ("HTTP 422 ...") are not worth showing
    if classified.message.is_empty() || classified.message.starts_with("HTTP ") {
        fallback.to_string()
    } else {
        classified.message.clone()
    }
}
