//! Queue state views: per-operation state and whole-queue snapshots.

use serde::{Deserialize, Serialize};

use super::ids::OperationId;
use super::operation::{FailedOperation, QueuedOperation};

/// Where an operation currently lives.
///
/// State transitions:
/// - Pending -> Processing -> (removed on success)
/// - Pending -> Processing -> Pending (requeued at tail, retry_count + 1)
/// - Pending -> Processing -> Failed (budget exhausted or non-retryable)
/// - Failed -> Pending (only via explicit retry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Pending,
    Processing,
    Failed,
}

impl OperationState {
    /// Is this a state that needs a human to act?
    pub fn needs_attention(self) -> bool {
        matches!(self, OperationState::Failed)
    }
}

/// Immutable copy of the queue handed to subscribers.
///
/// An id appears in at most one of the three collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub pending: Vec<QueuedOperation>,
    pub processing: Vec<OperationId>,
    pub failed: Vec<FailedOperation>,
}

impl QueueSnapshot {
    pub fn counts(&self) -> QueueCounts {
        QueueCounts {
            pending: self.pending.len(),
            processing: self.processing.len(),
            failed: self.failed.len(),
        }
    }

    pub fn state_of(&self, id: OperationId) -> Option<OperationState> {
        if self.processing.contains(&id) {
            Some(OperationState::Processing)
        } else if self.pending.iter().any(|op| op.id == id) {
            Some(OperationState::Pending)
        } else if self.failed.iter().any(|f| f.operation.id == id) {
            Some(OperationState::Failed)
        } else {
            None
        }
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.processing.is_empty()
    }
}

/// Counts by state, for badges and status lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub processing: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.failed
    }
}
