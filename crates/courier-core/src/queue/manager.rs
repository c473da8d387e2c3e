use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::flight::FlightGuard;
use super::notify::{ListenerHandle, Notifier, Subscription};
use super::store::{PersistedQueue, QueueStore};
use super::{ProcessReport, ProcessSummary, RequeuePolicy, SkipReason};
use crate::app::Connectivity;
use crate::config::QueueConfig;
use crate::domain::{
    FailedOperation, FailureDisposition, OperationId, QueueCounts, QueueSnapshot,
    QueuedOperation, RequestTarget,
};
use crate::error::CourierError;
use crate::ports::{Clock, IdGenerator};
use crate::transport::{RetryTransport, TransportOptions};

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<QueuedOperation>,
    /// Popped from `pending` and currently being dispatched.
    in_flight: Option<QueuedOperation>,
    failed: Vec<FailedOperation>,
}

impl QueueState {
    fn from_persisted(persisted: PersistedQueue) -> Self {
        Self {
            pending: persisted.pending.into(),
            in_flight: None,
            failed: persisted.failed,
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            pending: self.pending.iter().cloned().collect(),
            processing: self.in_flight.iter().map(|op| op.id).collect(),
            failed: self.failed.clone(),
        }
    }

    /// The in-flight operation is stored at the head of `pending` with its
    /// pre-attempt `retry_count`: after a crash it looks never attempted.
    fn persisted(&self) -> PersistedQueue {
        PersistedQueue {
            pending: self
                .in_flight
                .iter()
                .chain(self.pending.iter())
                .cloned()
                .collect(),
            failed: self.failed.clone(),
        }
    }

    fn occupied(&self) -> usize {
        self.pending.len() + usize::from(self.in_flight.is_some())
    }
}

/// Durable FIFO of side-effecting requests, drained while online.
///
/// - Every mutation is persisted and then broadcast to subscribers while the
///   state lock is held, so subscribers see mutations in order.
/// - The lock is released for the duration of each dispatch; `enqueue` and
///   `snapshot` stay responsive while a request is in flight.
/// - At most one processing loop runs at a time.
pub struct QueueManager {
    config: QueueConfig,
    state: Mutex<QueueState>,
    store: QueueStore,
    transport: Arc<RetryTransport>,
    connectivity: Connectivity,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    running: AtomicBool,
}

impl QueueManager {
    /// Build a manager from whatever `store` holds. Nothing is in flight
    /// after a restore.
    pub async fn restore(
        config: QueueConfig,
        store: QueueStore,
        transport: Arc<RetryTransport>,
        connectivity: Connectivity,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CourierError> {
        let persisted = store.load().await?;
        if persisted.pending.len() > config.max_queue_size {
            warn!(
                pending = persisted.pending.len(),
                capacity = config.max_queue_size,
                "restored queue exceeds capacity; new operations are refused until it drains"
            );
        }
        info!(
            key = store.key(),
            pending = persisted.pending.len(),
            failed = persisted.failed.len(),
            "queue restored"
        );

        Ok(Self {
            config,
            state: Mutex::new(QueueState::from_persisted(persisted)),
            store,
            transport,
            connectivity,
            ids,
            clock,
            notifier: Notifier::new(),
            running: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Append an operation to the tail of `pending`.
    ///
    /// At capacity this fails with `QueueFull` and changes nothing: no
    /// write, no notification. If the write fails the operation is dropped
    /// again before the error is returned.
    pub async fn enqueue(
        &self,
        target: RequestTarget,
        description: impl Into<String>,
        max_retries: Option<u32>,
    ) -> Result<OperationId, CourierError> {
        let mut state = self.state.lock().await;
        if state.occupied() >= self.config.max_queue_size {
            warn!(
                capacity = self.config.max_queue_size,
                "queue full, rejecting operation"
            );
            return Err(CourierError::QueueFull {
                capacity: self.config.max_queue_size,
            });
        }

        let operation = QueuedOperation::new(
            self.ids.generate_operation_id(),
            target,
            description,
            max_retries.unwrap_or(self.config.default_max_retries),
            self.clock.now(),
        );
        let id = operation.id;
        info!(
            operation = %id,
            method = operation.target.method(),
            url = %operation.target.url,
            description = %operation.description,
            "operation enqueued"
        );
        state.pending.push_back(operation);

        if let Err(e) = self.store.save(&state.persisted()).await {
            state.pending.pop_back();
            error!(operation = %id, "persist failed, operation dropped: {e}");
            return Err(e);
        }
        self.notifier.publish(state.snapshot());
        Ok(id)
    }

    /// Drain `pending` in order while online.
    ///
    /// Each operation gets one attempt per pass with the transport's backoff
    /// disabled; the queue's own retry budget applies across passes.
    pub async fn process_queue(&self) -> Result<ProcessReport, CourierError> {
        if !self.connectivity.is_online() {
            debug!("offline, queue processing skipped");
            return Ok(ProcessReport::Skipped(SkipReason::Offline));
        }
        let Some(guard) = FlightGuard::try_acquire(&self.running) else {
            debug!("queue processing already running");
            return Ok(ProcessReport::Skipped(SkipReason::AlreadyRunning));
        };
        let mut flight = Some(guard);

        let options = TransportOptions::single_attempt(self.config.dispatch_timeout());
        let mut summary = ProcessSummary::default();

        loop {
            if !self.connectivity.is_online() {
                // a reconnect racing with this exit would be skipped as
                // AlreadyRunning, so look once more after releasing
                drop(flight.take());
                if self.connectivity.is_online() {
                    flight = FlightGuard::try_acquire(&self.running);
                    if flight.is_some() {
                        continue;
                    }
                }
                info!("connectivity lost, pausing queue processing");
                break;
            }

            let mut operation = {
                let mut state = self.state.lock().await;
                let Some(operation) = state.pending.pop_front() else {
                    // released under the state lock: any later enqueue finds
                    // the flag clear and its own process_queue call runs
                    drop(flight.take());
                    break;
                };
                state.in_flight = Some(operation.clone());
                // persisted layout is unchanged, only subscribers need to know
                self.notifier.publish(state.snapshot());
                operation
            };

            debug!(
                operation = %operation.id,
                attempt = operation.retry_count + 1,
                "dispatching"
            );
            let result = self.transport.fetch(&operation.target, &options).await;

            let mut state = self.state.lock().await;
            state.in_flight = None;
            match result {
                Ok(_) => {
                    info!(operation = %operation.id, "operation delivered");
                    summary.succeeded += 1;
                }
                Err(err) => match operation.record_failure(err.is_retryable()) {
                    FailureDisposition::Requeue => {
                        warn!(
                            operation = %operation.id,
                            retry_count = operation.retry_count,
                            max_retries = operation.max_retries,
                            "delivery failed, requeued: {err}"
                        );
                        summary.requeued += 1;
                        match self.config.requeue {
                            RequeuePolicy::Tail => state.pending.push_back(operation),
                            RequeuePolicy::Head => state.pending.push_front(operation),
                        }
                    }
                    FailureDisposition::Fail => {
                        error!(
                            operation = %operation.id,
                            retry_count = operation.retry_count,
                            retryable = err.is_retryable(),
                            "delivery failed permanently: {err}"
                        );
                        summary.failed += 1;
                        state.failed.push(FailedOperation {
                            operation,
                            error: err.to_string(),
                            status: err.status(),
                            retryable: err.is_retryable(),
                        });
                    }
                },
            }
            self.commit(&state).await?;
        }

        debug!(
            succeeded = summary.succeeded,
            requeued = summary.requeued,
            failed = summary.failed,
            "queue processing finished"
        );
        Ok(ProcessReport::Completed(summary))
    }

    /// Give a failed operation a fresh retry budget and process the queue.
    pub async fn retry_failed(&self, id: OperationId) -> Result<ProcessReport, CourierError> {
        {
            let mut state = self.state.lock().await;
            let index = state
                .failed
                .iter()
                .position(|f| f.operation.id == id)
                .ok_or(CourierError::NotFound(id))?;
            if state.occupied() >= self.config.max_queue_size {
                return Err(CourierError::QueueFull {
                    capacity: self.config.max_queue_size,
                });
            }

            let failed = state.failed.remove(index);
            let mut operation = failed.operation.clone();
            operation.reset_retries();
            state.pending.push_back(operation);

            if let Err(e) = self.store.save(&state.persisted()).await {
                state.pending.pop_back();
                state.failed.insert(index, failed);
                return Err(e);
            }
            self.notifier.publish(state.snapshot());
            info!(operation = %id, "failed operation requeued manually");
        }

        self.process_queue().await
    }

    /// Drop every failed operation. A no-op when there are none.
    pub async fn clear_failed(&self) -> Result<(), CourierError> {
        let mut state = self.state.lock().await;
        if state.failed.is_empty() {
            return Ok(());
        }

        let cleared = std::mem::take(&mut state.failed);
        if let Err(e) = self.store.save(&state.persisted()).await {
            state.failed = cleared;
            return Err(e);
        }
        self.notifier.publish(state.snapshot());
        info!(cleared = cleared.len(), "failed operations cleared");
        Ok(())
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn counts(&self) -> QueueCounts {
        self.snapshot().await.counts()
    }

    pub async fn subscribe(&self) -> Subscription {
        let state = self.state.lock().await;
        self.notifier.subscribe(state.snapshot())
    }

    /// Call `listener` with the current snapshot, then after every mutation,
    /// until the returned handle is dropped.
    pub async fn on_change<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&QueueSnapshot) + Send + 'static,
    {
        let id = self.ids.generate_listener_id();
        let subscription = self.subscribe().await;
        debug!(listener = %id, "listener registered");
        ListenerHandle::spawn(id, subscription, listener)
    }

    async fn commit(&self, state: &QueueState) -> Result<(), CourierError> {
        self.store.save(&state.persisted()).await?;
        self.notifier.publish(state.snapshot());
        Ok(())
    }
}
