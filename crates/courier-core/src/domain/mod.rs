//! Domain model (IDs, request descriptors, queued operations, snapshots).

pub mod ids;
pub mod operation;
pub mod request;
pub mod state;

pub use ids::{ListenerId, OperationId};
pub use operation::{DEFAULT_MAX_RETRIES, FailedOperation, FailureDisposition, QueuedOperation};
pub use request::RequestTarget;
pub use state::{OperationState, QueueCounts, QueueSnapshot};
