//! Connectivity signal and the bridge that drains the queue when it returns.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::queue::{ProcessReport, QueueManager};

/// Pending "process now" requests buffered before further ones coalesce.
const TRIGGER_CAPACITY: usize = 8;

/// Shared online/offline flag.
///
/// Cloning yields another handle onto the same flag. The host platform's
/// network observer calls `set_online`; everything else only reads.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns `true` if the flag actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "connectivity changed");
        }
        changed
    }

    /// Receiver that wakes on every change of the flag.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Wait until the flag changes and return the new value.
    pub async fn changed(&self) -> bool {
        let mut rx = self.watch();
        // the sender lives in `self`, so this can't be closed
        let _ = rx.changed().await;
        *rx.borrow()
    }
}

/// Asks a running bridge to call `process_queue` now.
#[derive(Debug, Clone)]
pub struct ProcessTrigger {
    tx: mpsc::Sender<()>,
}

impl ProcessTrigger {
    /// Returns `false` once the bridge has stopped. A request made while
    /// another is still queued is folded into it.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Background task that processes the queue on every offline -> online
/// transition and on each `ProcessTrigger::request`.
///
/// - `shutdown()` で停止し、実行中の処理ループの終了を待つ
/// - drop しても停止する（`shutdown_tx` の drop で `changed()` が Err になる）
pub struct ConnectivityBridge {
    shutdown_tx: watch::Sender<bool>,
    trigger: ProcessTrigger,
    join: JoinHandle<()>,
}

impl ConnectivityBridge {
    pub fn spawn(manager: Arc<QueueManager>, connectivity: Connectivity) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_CAPACITY);

        // the baseline is taken here, not in the task: a change made before
        // the task is first polled must still count as a transition
        let mut online_rx = connectivity.watch();
        let was_online = *online_rx.borrow_and_update();

        let join = tokio::spawn(bridge_loop(
            manager,
            online_rx,
            was_online,
            trigger_rx,
            shutdown_rx,
        ));

        Self {
            shutdown_tx,
            trigger: ProcessTrigger { tx: trigger_tx },
            join,
        }
    }

    pub fn trigger(&self) -> ProcessTrigger {
        self.trigger.clone()
    }

    pub async fn shutdown(self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

async fn bridge_loop(
    manager: Arc<QueueManager>,
    mut online_rx: watch::Receiver<bool>,
    mut was_online: bool,
    mut trigger_rx: mpsc::Receiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            changed = online_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *online_rx.borrow_and_update();
                let reconnected = online && !was_online;
                was_online = online;
                if reconnected {
                    info!("back online, processing queue");
                    run_once(&manager).await;
                }
            }
            request = trigger_rx.recv() => {
                if request.is_none() {
                    break;
                }
                run_once(&manager).await;
            }
        }
    }
    debug!("connectivity bridge stopped");
}

async fn run_once(manager: &QueueManager) {
    match manager.process_queue().await {
        Ok(ProcessReport::Completed(summary)) => debug!(
            succeeded = summary.succeeded,
            requeued = summary.requeued,
            failed = summary.failed,
            "bridge-triggered processing finished"
        ),
        Ok(ProcessReport::Skipped(reason)) => debug!(?reason, "bridge-triggered processing skipped"),
        Err(e) => error!("queue processing failed: {e}"),
    }
}
