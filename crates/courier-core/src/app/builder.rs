//! CourierBuilder - 構築とワイヤリング
//!
//! 設定・Sender・KeyValueStore から `Courier` を組み立てます。
//! 設定は build() 時に検証します（Fail-fast 設計）。

use std::sync::Arc;

use tracing::info;

use super::connectivity::{Connectivity, ConnectivityBridge, ProcessTrigger};
use crate::config::CourierConfig;
use crate::error::CourierError;
use crate::ports::{Clock, IdGenerator, KeyValueStore, Sender, SystemClock, UlidGenerator};
use crate::queue::{QueueManager, QueueStore};
use crate::transport::RetryTransport;

/// CourierBuilder は `Courier` を構築
///
/// # 使用例
/// ```ignore
/// let courier = CourierBuilder::new(config, sender, store)
///     .connectivity(Connectivity::offline())
///     .build()
///     .await?;
/// courier.manager.enqueue(target, "Save zones", None).await?;
/// ```
pub struct CourierBuilder {
    config: CourierConfig,
    sender: Arc<dyn Sender>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    connectivity: Connectivity,
}

impl CourierBuilder {
    pub fn new(
        config: CourierConfig,
        sender: Arc<dyn Sender>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            sender,
            store,
            clock: Arc::new(SystemClock),
            ids: None,
            connectivity: Connectivity::online(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defaults to ULIDs stamped by the builder's clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Share an existing connectivity flag (starts online otherwise).
    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Validate the config, restore the persisted queue and start the
    /// connectivity bridge. Must run inside a tokio runtime.
    pub async fn build(self) -> Result<Courier, CourierError> {
        self.config.validate()?;

        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(self.clock.clone())),
        };
        let transport = Arc::new(RetryTransport::new(
            self.sender,
            self.config.transport.options(),
        ));
        let store = QueueStore::new(self.store, self.config.queue.storage_key.clone());

        let manager = Arc::new(
            QueueManager::restore(
                self.config.queue.clone(),
                store,
                transport.clone(),
                self.connectivity.clone(),
                ids,
                self.clock,
            )
            .await?,
        );
        let bridge = ConnectivityBridge::spawn(manager.clone(), self.connectivity.clone());

        // leftovers from a previous run are sent without waiting for a reconnect
        let pending = manager.counts().await.pending;
        if pending > 0 && self.connectivity.is_online() {
            bridge.trigger().request();
        }
        info!(
            capacity = self.config.queue.max_queue_size,
            online = self.connectivity.is_online(),
            pending,
            "courier ready"
        );

        Ok(Courier {
            manager,
            transport,
            bridge,
            connectivity: self.connectivity,
        })
    }
}

/// Courier はワイヤリング済みのサービス一式
pub struct Courier {
    pub manager: Arc<QueueManager>,
    /// Direct (non-queued) requests with the configured backoff.
    pub transport: Arc<RetryTransport>,
    pub bridge: ConnectivityBridge,
    pub connectivity: Connectivity,
}

impl Courier {
    pub fn trigger(&self) -> ProcessTrigger {
        self.bridge.trigger()
    }

    pub async fn shutdown(self) {
        self.bridge.shutdown().await;
    }
}
