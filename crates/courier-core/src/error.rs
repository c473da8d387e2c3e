use thiserror::Error;

use crate::domain::OperationId;

/// Errors surfaced by the queue manager and its wiring.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Backpressure: the queue is at capacity and refuses new work.
    #[error("queue is full (capacity {capacity}); operation was not enqueued")]
    QueueFull { capacity: usize },

    #[error("operation not found: {0}")]
    NotFound(OperationId),

    #[error("queue store: {0}")]
    Store(#[from] StoreError),

    #[error("serialize queue state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors from a `KeyValueStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Backend(String),
}
