//! Queue - 永続化されたオペレーションキュー
//!
//! # 主要コンポーネント
//! - **QueueManager**: enqueue / process / retry / clear と変更通知
//! - **QueueStore**: `KeyValueStore` 上のスナップショット永続化
//! - **Subscription / ListenerHandle**: 変更通知の購読

mod flight;
mod manager;
mod notify;
pub mod store;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

pub use self::manager::QueueManager;
pub use self::notify::{ListenerHandle, Subscription};
pub use self::store::{PersistedQueue, QueueStore};

/// Where a failed-but-retryable operation goes back into `pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequeuePolicy {
    /// Behind everything else, so one flaky operation can't starve the rest.
    #[default]
    Tail,
    /// Back at the front: retried immediately, strict FIFO order.
    Head,
}

/// Result of one `process_queue` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessReport {
    Skipped(SkipReason),
    Completed(ProcessSummary),
}

impl ProcessReport {
    pub fn summary(&self) -> Option<ProcessSummary> {
        match self {
            ProcessReport::Completed(summary) => Some(*summary),
            ProcessReport::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
}

/// Per-call tallies of one processing loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub succeeded: usize,
    pub requeued: usize,
    pub failed: usize,
}

impl ProcessSummary {
    pub fn dispatched(&self) -> usize {
        self.succeeded + self.requeued + self.failed
    }
}
