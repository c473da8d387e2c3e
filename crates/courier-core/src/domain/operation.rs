//! Queued operation record: request descriptor + retry bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::OperationId;
use super::request::RequestTarget;

/// Retry ceiling used when the caller does not supply one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One deferred side-effecting request.
///
/// Design:
/// - `id` is assigned once at enqueue time and never changes.
/// - Only the queue manager mutates `retry_count` (via the methods below).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub id: OperationId,
    pub target: RequestTarget,

    /// Human-readable label, never used for dispatch.
    pub description: String,

    pub enqueued_at: DateTime<Utc>,

    /// Number of failed attempts already requeued. Never exceeds `max_retries`.
    pub retry_count: u32,
    pub max_retries: u32,
}

/// What the queue should do with an operation after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Put it back in `pending` (retry budget remains).
    Requeue,
    /// Move it to `failed` (budget exhausted, or the failure can't be fixed by retrying).
    Fail,
}

impl QueuedOperation {
    pub fn new(
        id: OperationId,
        target: RequestTarget,
        description: impl Into<String>,
        max_retries: u32,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            target,
            description: description.into(),
            enqueued_at,
            retry_count: 0,
            max_retries,
        }
    }

    pub fn has_retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Record a failed attempt and decide where the operation goes next.
    ///
    /// `retry_count` only grows when the operation is requeued, so it reaches
    /// `max_retries` after exactly `max_retries` requeue cycles and then stays there.
    pub fn record_failure(&mut self, retryable: bool) -> FailureDisposition {
        if retryable && self.has_retries_left() {
            self.retry_count += 1;
            FailureDisposition::Requeue
        } else {
            FailureDisposition::Fail
        }
    }

    /// Reset the retry budget (manual retry of a failed operation).
    pub fn reset_retries(&mut self) {
        self.retry_count = 0;
    }
}

/// A terminally failed operation and the message of its last failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedOperation {
    pub operation: QueuedOperation,
    pub error: String,
    /// HTTP status of the last failure, if the server answered at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Whether the last failure was transient (network, timeout, 5xx, 429).
    #[serde(default)]
    pub retryable: bool,
}
