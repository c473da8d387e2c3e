//! Change notification: typed pub-sub over a broadcast channel.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{ListenerId, QueueSnapshot};

/// Snapshots buffered per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

pub(crate) struct Notifier {
    tx: broadcast::Sender<QueueSnapshot>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub(crate) fn publish(&self, snapshot: QueueSnapshot) {
        // no subscribers is fine
        let _ = self.tx.send(snapshot);
    }

    /// Must be called under the same lock as `publish` so `current` and the
    /// stream that follows it line up.
    pub(crate) fn subscribe(&self, current: QueueSnapshot) -> Subscription {
        Subscription {
            initial: Some(current),
            rx: self.tx.subscribe(),
        }
    }
}

/// Live view of the queue.
///
/// The first `recv` yields the state at subscription time, later ones yield
/// each mutation. A subscriber that falls behind skips to newer snapshots
/// rather than blocking the queue. Drop it (or call `unsubscribe`) to stop.
pub struct Subscription {
    initial: Option<QueueSnapshot>,
    rx: broadcast::Receiver<QueueSnapshot>,
}

impl Subscription {
    /// Wait for the next snapshot. `None` once the queue manager is gone.
    pub async fn recv(&mut self) -> Option<QueueSnapshot> {
        if let Some(snapshot) = self.initial.take() {
            return Some(snapshot);
        }
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscriber lagged, skipping to newer snapshots");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next snapshot if one is already available.
    pub fn try_recv(&mut self) -> Option<QueueSnapshot> {
        if let Some(snapshot) = self.initial.take() {
            return Some(snapshot);
        }
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

/// Handle of a closure registered with `QueueManager::on_change`.
///
/// The listener runs until `unsubscribe` is called or the handle is dropped.
#[must_use = "dropping the handle unsubscribes the listener"]
pub struct ListenerHandle {
    id: ListenerId,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn spawn<F>(id: ListenerId, mut subscription: Subscription, listener: F) -> Self
    where
        F: Fn(&QueueSnapshot) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.recv().await {
                listener(&snapshot);
            }
        });
        Self { id, task }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn unsubscribe(self) {
        debug!(listener = %self.id, "listener unsubscribed");
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
