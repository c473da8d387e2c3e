//! Persistence adapter: the queue snapshot under one key of a `KeyValueStore`.
//!
//! Layout: `{ "pending": [QueuedOperation], "failed": [{ operation, error }] }`.
//! `processing` is never written.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::domain::{FailedOperation, QueuedOperation};
use crate::error::CourierError;
use crate::ports::KeyValueStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedQueue {
    #[serde(default)]
    pub pending: Vec<QueuedOperation>,
    #[serde(default)]
    pub failed: Vec<FailedOperation>,
}

pub struct QueueStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl QueueStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the persisted queue. A missing key is an empty queue.
    ///
    /// An unreadable value is copied to `<key>.corrupt` and the queue starts
    /// empty, so a bad write can't block startup and the data is still there
    /// for manual recovery.
    pub async fn load(&self) -> Result<PersistedQueue, CourierError> {
        let Some(raw) = self.kv.get(&self.key).await? else {
            debug!(key = %self.key, "no persisted queue");
            return Ok(PersistedQueue::default());
        };

        match serde_json::from_str::<PersistedQueue>(&raw) {
            Ok(queue) => {
                debug!(
                    key = %self.key,
                    pending = queue.pending.len(),
                    failed = queue.failed.len(),
                    "restored persisted queue"
                );
                Ok(queue)
            }
            Err(e) => {
                let backup = format!("{}.corrupt", self.key);
                error!(key = %self.key, backup = %backup, "persisted queue is unreadable: {e}");
                self.kv.set(&backup, &raw).await?;
                Ok(PersistedQueue::default())
            }
        }
    }

    pub async fn save(&self, queue: &PersistedQueue) -> Result<(), CourierError> {
        let raw = serde_json::to_string(queue)?;
        self.kv.set(&self.key, &raw).await?;
        Ok(())
    }
}
