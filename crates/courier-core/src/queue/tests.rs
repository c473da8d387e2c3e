use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rstest::rstest;
use tokio::sync::mpsc;

use super::*;
use crate::app::Connectivity;
use crate::config::QueueConfig;
use crate::domain::{OperationId, OperationState, QueueCounts, QueueSnapshot, RequestTarget};
use crate::error::{CourierError, StoreError};
use crate::impls::MemoryStore;
use crate::ports::{KeyValueStore, SystemClock, UlidGenerator};
use crate::testing::{ScriptedSender, Step};
use crate::transport::{RetryTransport, TransportOptions};

const KEY: &str = "courier.queue";

struct Harness {
    manager: Arc<QueueManager>,
    sender: Arc<ScriptedSender>,
    kv: Arc<MemoryStore>,
    connectivity: Connectivity,
}

impl Harness {
    async fn new(sender: ScriptedSender) -> Self {
        Self::with(sender, QueueConfig::default(), Arc::new(MemoryStore::new())).await
    }

    async fn with(sender: ScriptedSender, config: QueueConfig, kv: Arc<MemoryStore>) -> Self {
        let sender = Arc::new(sender);
        let connectivity = Connectivity::online();
        let manager = restore(&sender, config, kv.clone(), &connectivity).await;
        Self {
            manager: Arc::new(manager),
            sender,
            kv,
            connectivity,
        }
    }

    async fn enqueue(&self, url: &str, max_retries: Option<u32>) -> OperationId {
        self.manager
            .enqueue(RequestTarget::post(url), format!("POST {url}"), max_retries)
            .await
            .unwrap()
    }

    async fn persisted(&self) -> Option<String> {
        self.kv.get(KEY).await.unwrap()
    }

    async fn summary(&self) -> ProcessSummary {
        self.manager
            .process_queue()
            .await
            .unwrap()
            .summary()
            .unwrap()
    }
}

async fn restore(
    sender: &Arc<ScriptedSender>,
    config: QueueConfig,
    kv: Arc<dyn KeyValueStore>,
    connectivity: &Connectivity,
) -> QueueManager {
    QueueManager::restore(
        config,
        QueueStore::new(kv, KEY),
        Arc::new(RetryTransport::new(sender.clone(), TransportOptions::default())),
        connectivity.clone(),
        Arc::new(UlidGenerator::new(SystemClock)),
        Arc::new(SystemClock),
    )
    .await
    .unwrap()
}

fn capacity(max_queue_size: usize) -> QueueConfig {
    QueueConfig {
        max_queue_size,
        ..QueueConfig::default()
    }
}

async fn wait_for_dispatch(sender: &ScriptedSender, count: usize) {
    while sender.call_count() < count {
        tokio::task::yield_now().await;
    }
}

/// Accepts reads, refuses every write.
struct ReadOnlyStore;

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("read-only".into()))
    }

    async fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("read-only".into()))
    }
}

// ---------------------------------------------------------------
// enqueue
// ---------------------------------------------------------------

#[tokio::test]
async fn enqueue_appends_persists_and_notifies() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200))).await;
    let mut sub = h.manager.subscribe().await;
    assert_eq!(sub.recv().await.unwrap(), QueueSnapshot::default());

    let id = h.enqueue("/api/zones", Some(5)).await;

    let update = sub.recv().await.unwrap();
    assert_eq!(update.pending.len(), 1);
    assert_eq!(update.pending[0].id, id);
    assert_eq!(update.pending[0].max_retries, 5);
    assert_eq!(update.pending[0].retry_count, 0);

    let persisted: PersistedQueue = serde_json::from_str(&h.persisted().await.unwrap()).unwrap();
    assert_eq!(persisted.pending, update.pending);
    assert_eq!(h.sender.call_count(), 0);
}

#[tokio::test]
async fn enqueue_uses_configured_default_retries() {
    let config = QueueConfig {
        default_max_retries: 7,
        ..QueueConfig::default()
    };
    let h = Harness::with(
        ScriptedSender::always(Step::Status(200)),
        config,
        Arc::new(MemoryStore::new()),
    )
    .await;

    h.enqueue("/a", None).await;
    assert_eq!(h.manager.snapshot().await.pending[0].max_retries, 7);
}

#[tokio::test]
async fn enqueue_at_capacity_changes_nothing() {
    let h = Harness::with(
        ScriptedSender::always(Step::Status(200)),
        capacity(2),
        Arc::new(MemoryStore::new()),
    )
    .await;
    h.enqueue("/a", None).await;
    h.enqueue("/b", None).await;

    let before = h.manager.snapshot().await;
    let persisted_before = h.persisted().await;
    let mut sub = h.manager.subscribe().await;
    sub.recv().await.unwrap();

    let err = h
        .manager
        .enqueue(RequestTarget::post("/c"), "third", None)
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::QueueFull { capacity: 2 }));
    assert_eq!(h.manager.snapshot().await, before);
    assert_eq!(h.persisted().await, persisted_before);
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn enqueue_is_dropped_when_persist_fails() {
    let sender = Arc::new(ScriptedSender::always(Step::Status(200)));
    let manager = restore(
        &sender,
        QueueConfig::default(),
        Arc::new(ReadOnlyStore),
        &Connectivity::online(),
    )
    .await;

    let err = manager
        .enqueue(RequestTarget::post("/a"), "a", None)
        .await
        .unwrap_err();

    assert!(matches!(err, CourierError::Store(_)));
    assert_eq!(manager.counts().await, QueueCounts::default());
}

// ---------------------------------------------------------------
// process_queue
// ---------------------------------------------------------------

#[tokio::test]
async fn successful_operations_are_removed_in_order() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200))).await;
    h.enqueue("/a", None).await;
    h.enqueue("/b", None).await;
    h.enqueue("/c", None).await;

    let summary = h.summary().await;

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.dispatched(), 3);
    assert_eq!(h.sender.calls(), vec!["/a", "/b", "/c"]);
    assert!(h.manager.snapshot().await.is_idle());

    let persisted: PersistedQueue = serde_json::from_str(&h.persisted().await.unwrap()).unwrap();
    assert_eq!(persisted, PersistedQueue::default());
}

#[tokio::test]
async fn transient_failures_then_success_remove_the_operation() {
    let h = Harness::new(ScriptedSender::new(vec![
        Step::Status(503),
        Step::Status(503),
        Step::Status(200),
    ]))
    .await;
    h.enqueue("/api/zones", Some(2)).await;

    let summary = h.summary().await;

    assert_eq!(
        summary,
        ProcessSummary {
            succeeded: 1,
            requeued: 2,
            failed: 0
        }
    );
    assert_eq!(h.sender.call_count(), 3);
    assert_eq!(h.manager.counts().await, QueueCounts::default());
}

#[rstest]
#[case::no_retries(0, 500)]
#[case::one_retry(1, 500)]
#[case::three_retries(3, 503)]
#[case::rate_limited(2, 429)]
#[tokio::test]
async fn exhausted_budget_fails_exactly_once(#[case] max_retries: u32, #[case] status: u16) {
    let h = Harness::new(ScriptedSender::always(Step::Status(status))).await;
    let id = h.enqueue("/api/zones", Some(max_retries)).await;

    let summary = h.summary().await;

    assert_eq!(summary.requeued, max_retries as usize);
    assert_eq!(summary.failed, 1);
    assert_eq!(h.sender.call_count(), max_retries as usize + 1);

    let snapshot = h.manager.snapshot().await;
    assert!(snapshot.pending.is_empty());
    assert_eq!(snapshot.failed.len(), 1);
    assert_eq!(snapshot.failed[0].operation.id, id);
    assert_eq!(snapshot.failed[0].operation.retry_count, max_retries);
    assert!(snapshot.failed[0].error.contains(&status.to_string()));
    assert_eq!(snapshot.failed[0].status, Some(status));

    // a later pass has nothing left to do
    assert_eq!(h.summary().await.dispatched(), 0);
}

#[rstest]
#[case::bad_request(400)]
#[case::not_found(404)]
#[case::conflict(409)]
#[case::unprocessable(422)]
#[tokio::test]
async fn client_errors_fail_without_requeue(#[case] status: u16) {
    let h = Harness::new(ScriptedSender::always(Step::Status(status))).await;
    h.enqueue("/api/zones", Some(3)).await;

    let summary = h.summary().await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.requeued, 0);
    assert_eq!(h.sender.call_count(), 1);
    let failed = &h.manager.snapshot().await.failed[0];
    assert_eq!(failed.operation.retry_count, 0);
    assert!(!failed.retryable);
}

#[tokio::test]
async fn exhausted_network_failure_keeps_its_transient_flag() {
    let h = Harness::new(ScriptedSender::always(Step::NetworkDown)).await;
    h.enqueue("/a", Some(0)).await;

    assert_eq!(h.summary().await.failed, 1);

    let failed = &h.manager.snapshot().await.failed[0];
    assert_eq!(failed.status, None);
    assert!(failed.retryable);
    assert!(failed.error.contains("network error"));
}

#[tokio::test]
async fn server_error_message_is_kept() {
    let h = Harness::new(ScriptedSender::always(Step::Body(
        500,
        r#"{"message":"database unavailable"}"#,
    )))
    .await;
    h.enqueue("/api/zones", Some(1)).await;

    h.summary().await;

    let failed = &h.manager.snapshot().await.failed[0];
    assert_eq!(failed.error, "HTTP 500: database unavailable");
}

#[tokio::test]
async fn malformed_success_body_is_not_retried() {
    let h = Harness::new(ScriptedSender::always(Step::Body(200, "<html>"))).await;
    h.enqueue("/a", Some(3)).await;

    assert_eq!(h.summary().await.failed, 1);
    assert_eq!(h.sender.call_count(), 1);
}

#[tokio::test]
async fn network_errors_are_requeued() {
    let h = Harness::new(ScriptedSender::new(vec![Step::NetworkDown, Step::Status(201)])).await;
    h.enqueue("/a", Some(1)).await;

    let summary = h.summary().await;
    assert_eq!(summary.requeued, 1);
    assert_eq!(summary.succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn hung_dispatch_times_out_and_counts_as_transient() {
    let config = QueueConfig {
        dispatch_timeout_ms: 50,
        ..QueueConfig::default()
    };
    let h = Harness::with(
        ScriptedSender::always(Step::Hang),
        config,
        Arc::new(MemoryStore::new()),
    )
    .await;
    h.enqueue("/a", Some(1)).await;

    let summary = h.summary().await;

    assert_eq!(summary.requeued, 1);
    assert_eq!(summary.failed, 1);
    let failed = &h.manager.snapshot().await.failed[0];
    assert!(failed.error.contains("timed out"));
    assert_eq!(failed.status, None);
    assert!(failed.retryable);
}

#[tokio::test]
async fn requeued_operation_goes_behind_the_rest() {
    let sender = ScriptedSender::always(Step::Status(200))
        .route("/a", vec![Step::Status(500), Step::Status(200)]);
    let h = Harness::new(sender).await;
    h.enqueue("/a", None).await;
    h.enqueue("/b", None).await;

    let summary = h.summary().await;

    // B completes before A's second attempt
    assert_eq!(h.sender.calls(), vec!["/a", "/b", "/a"]);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.requeued, 1);
}

#[tokio::test]
async fn head_policy_retries_in_place() {
    let sender = ScriptedSender::always(Step::Status(200))
        .route("/a", vec![Step::Status(500), Step::Status(200)]);
    let config = QueueConfig {
        requeue: RequeuePolicy::Head,
        ..QueueConfig::default()
    };
    let h = Harness::with(sender, config, Arc::new(MemoryStore::new())).await;
    h.enqueue("/a", None).await;
    h.enqueue("/b", None).await;

    h.summary().await;

    assert_eq!(h.sender.calls(), vec!["/a", "/a", "/b"]);
}

#[tokio::test]
async fn offline_processing_touches_nothing() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200))).await;
    h.enqueue("/a", None).await;
    h.connectivity.set_online(false);

    let snapshot_before = h.manager.snapshot().await;
    let persisted_before = h.persisted().await;

    let report = h.manager.process_queue().await.unwrap();

    assert_eq!(report, ProcessReport::Skipped(SkipReason::Offline));
    assert_eq!(h.sender.call_count(), 0);
    assert_eq!(h.manager.snapshot().await, snapshot_before);
    assert_eq!(h.persisted().await, persisted_before);
}

#[tokio::test]
async fn concurrent_processing_is_single_flight() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200)).with_gate()).await;
    let id = h.enqueue("/a", None).await;

    let manager = h.manager.clone();
    let first = tokio::spawn(async move { manager.process_queue().await });
    wait_for_dispatch(&h.sender, 1).await;

    let second = h.manager.process_queue().await.unwrap();
    assert_eq!(second, ProcessReport::Skipped(SkipReason::AlreadyRunning));

    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.processing, vec![id]);
    assert_eq!(snapshot.state_of(id), Some(OperationState::Processing));
    assert!(snapshot.pending.is_empty());

    h.sender.open_gate(1);
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.summary().unwrap().succeeded, 1);
    assert_eq!(h.sender.call_count(), 1);

    // the guard is released once the loop ends
    assert!(matches!(
        h.manager.process_queue().await.unwrap(),
        ProcessReport::Completed(_)
    ));
}

#[tokio::test]
async fn enqueue_stays_available_during_dispatch() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200)).with_gate()).await;
    h.enqueue("/a", None).await;

    let manager = h.manager.clone();
    let run = tokio::spawn(async move { manager.process_queue().await });
    wait_for_dispatch(&h.sender, 1).await;

    h.enqueue("/b", None).await;
    assert_eq!(
        h.manager.counts().await,
        QueueCounts {
            pending: 1,
            processing: 1,
            failed: 0
        }
    );

    h.sender.open_gate(2);
    let summary = run.await.unwrap().unwrap().summary().unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(h.sender.calls(), vec!["/a", "/b"]);
}

#[tokio::test]
async fn in_flight_operation_counts_toward_capacity() {
    let h = Harness::with(
        ScriptedSender::always(Step::Status(200)).with_gate(),
        capacity(1),
        Arc::new(MemoryStore::new()),
    )
    .await;
    h.enqueue("/a", None).await;

    let manager = h.manager.clone();
    let run = tokio::spawn(async move { manager.process_queue().await });
    wait_for_dispatch(&h.sender, 1).await;

    let err = h
        .manager
        .enqueue(RequestTarget::post("/b"), "b", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::QueueFull { capacity: 1 }));

    h.sender.open_gate(1);
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn going_offline_pauses_between_operations() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200)).with_gate()).await;
    h.enqueue("/a", None).await;
    let b = h.enqueue("/b", None).await;

    let manager = h.manager.clone();
    let run = tokio::spawn(async move { manager.process_queue().await });
    wait_for_dispatch(&h.sender, 1).await;

    h.connectivity.set_online(false);
    h.sender.open_gate(1);
    let summary = run.await.unwrap().unwrap().summary().unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(h.sender.call_count(), 1);
    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.pending.len(), 1);
    assert_eq!(snapshot.pending[0].id, b);
}

// ---------------------------------------------------------------
// persistence
// ---------------------------------------------------------------

#[tokio::test]
async fn restore_reproduces_pending_and_failed() {
    let kv = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(Step::Status(200)).route("/gone", vec![Step::Status(404)]);
    let h = Harness::with(sender, QueueConfig::default(), kv.clone()).await;

    h.enqueue("/gone", None).await;
    h.summary().await;
    h.connectivity.set_online(false);
    h.enqueue("/a", Some(1)).await;
    h.enqueue("/b", Some(4)).await;
    let before = h.manager.snapshot().await;

    let sender = Arc::new(ScriptedSender::always(Step::Status(200)));
    let restored = restore(&sender, QueueConfig::default(), kv, &Connectivity::offline()).await;

    assert_eq!(restored.snapshot().await, before);
    assert_eq!(before.counts().pending, 2);
    assert_eq!(before.counts().failed, 1);
}

#[tokio::test]
async fn crash_mid_dispatch_restores_operation_as_unattempted() {
    let kv = Arc::new(MemoryStore::new());
    let h = Harness::with(
        ScriptedSender::always(Step::Status(503)).with_gate(),
        QueueConfig::default(),
        kv.clone(),
    )
    .await;
    let a = h.enqueue("/a", Some(2)).await;
    let b = h.enqueue("/b", Some(2)).await;

    let manager = h.manager.clone();
    let run = tokio::spawn(async move { manager.process_queue().await });
    wait_for_dispatch(&h.sender, 1).await;
    run.abort();

    let sender = Arc::new(ScriptedSender::always(Step::Status(200)));
    let restored = restore(&sender, QueueConfig::default(), kv, &Connectivity::online()).await;
    let snapshot = restored.snapshot().await;

    assert!(snapshot.processing.is_empty());
    let ids: Vec<_> = snapshot.pending.iter().map(|op| op.id).collect();
    assert_eq!(ids, vec![a, b]);
    assert_eq!(snapshot.pending[0].retry_count, 0);
}

// ---------------------------------------------------------------
// retry_failed / clear_failed
// ---------------------------------------------------------------

#[tokio::test]
async fn retry_failed_resets_budget_and_processes() {
    let sender = ScriptedSender::always(Step::Status(200)).route(
        "/a",
        vec![Step::Status(503), Step::Status(503), Step::Status(200)],
    );
    let h = Harness::new(sender).await;
    let id = h.enqueue("/a", Some(1)).await;

    h.summary().await;
    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.state_of(id), Some(OperationState::Failed));
    assert_eq!(snapshot.failed[0].operation.retry_count, 1);

    let mut sub = h.manager.subscribe().await;
    sub.recv().await.unwrap();

    let report = h.manager.retry_failed(id).await.unwrap();
    assert_eq!(report.summary().unwrap().succeeded, 1);

    let requeued = sub.recv().await.unwrap();
    assert_eq!(requeued.state_of(id), Some(OperationState::Pending));
    assert_eq!(requeued.pending[0].retry_count, 0);
    assert!(requeued.failed.is_empty());

    assert_eq!(h.manager.counts().await, QueueCounts::default());
    assert_eq!(h.sender.call_count(), 3);
}

#[tokio::test]
async fn retry_failed_offline_only_requeues() {
    let h = Harness::new(ScriptedSender::always(Step::Status(409))).await;
    let id = h.enqueue("/a", None).await;
    h.summary().await;
    h.connectivity.set_online(false);

    let report = h.manager.retry_failed(id).await.unwrap();

    assert_eq!(report, ProcessReport::Skipped(SkipReason::Offline));
    assert_eq!(h.manager.snapshot().await.state_of(id), Some(OperationState::Pending));
}

#[tokio::test]
async fn retry_failed_unknown_id_is_not_found() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200))).await;
    let id = h.enqueue("/a", None).await;

    // pending, not failed
    let err = h.manager.retry_failed(id).await.unwrap_err();
    assert!(matches!(err, CourierError::NotFound(missing) if missing == id));
}

#[tokio::test]
async fn retry_failed_respects_capacity() {
    let sender = ScriptedSender::always(Step::Status(200)).route("/a", vec![Step::Status(400)]);
    let h = Harness::with(sender, capacity(1), Arc::new(MemoryStore::new())).await;
    let failed = h.enqueue("/a", None).await;
    h.summary().await;
    h.connectivity.set_online(false);
    h.enqueue("/b", None).await;

    let err = h.manager.retry_failed(failed).await.unwrap_err();

    assert!(matches!(err, CourierError::QueueFull { capacity: 1 }));
    assert_eq!(h.manager.snapshot().await.state_of(failed), Some(OperationState::Failed));
}

#[tokio::test]
async fn clear_failed_is_idempotent() {
    let h = Harness::new(ScriptedSender::always(Step::Status(400))).await;
    h.enqueue("/a", None).await;
    h.enqueue("/b", None).await;
    h.summary().await;
    assert_eq!(h.manager.counts().await.failed, 2);

    h.manager.clear_failed().await.unwrap();
    assert_eq!(h.manager.counts().await, QueueCounts::default());

    let persisted = h.persisted().await;
    let mut sub = h.manager.subscribe().await;
    sub.recv().await.unwrap();

    h.manager.clear_failed().await.unwrap();

    assert_eq!(h.manager.counts().await, QueueCounts::default());
    assert_eq!(h.persisted().await, persisted);
    assert!(sub.try_recv().is_none());
}

// ---------------------------------------------------------------
// notifications
// ---------------------------------------------------------------

#[tokio::test]
async fn subscribers_see_every_transition() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200))).await;
    let mut sub = h.manager.subscribe().await;

    let id = h.enqueue("/a", None).await;
    h.summary().await;

    let initial = sub.recv().await.unwrap();
    let enqueued = sub.recv().await.unwrap();
    let processing = sub.recv().await.unwrap();
    let done = sub.recv().await.unwrap();

    assert_eq!(initial.counts().total(), 0);
    assert_eq!(enqueued.state_of(id), Some(OperationState::Pending));
    assert_eq!(processing.state_of(id), Some(OperationState::Processing));
    assert_eq!(done.state_of(id), None);
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn on_change_runs_until_unsubscribed() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200))).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = h
        .manager
        .on_change(move |snapshot| {
            let _ = tx.send(snapshot.counts());
        })
        .await;

    assert_eq!(rx.recv().await.unwrap(), QueueCounts::default());
    h.enqueue("/a", None).await;
    assert_eq!(rx.recv().await.unwrap().pending, 1);

    handle.unsubscribe();
    h.enqueue("/b", None).await;

    let next = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
    assert!(matches!(next, Ok(None)));
}

#[tokio::test]
async fn subscription_ends_with_the_manager() {
    let h = Harness::new(ScriptedSender::always(Step::Status(200))).await;
    let mut sub = h.manager.subscribe().await;
    sub.recv().await.unwrap();

    drop(h);
    assert!(sub.recv().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn enqueue_racing_a_finishing_loop_is_never_stranded() {
    for _ in 0..200 {
        let h = Harness::new(ScriptedSender::always(Step::Status(200))).await;
        h.enqueue("/a", None).await;

        let manager = h.manager.clone();
        let draining = tokio::spawn(async move { manager.process_queue().await });
        let manager = h.manager.clone();
        let late = tokio::spawn(async move {
            manager.enqueue(RequestTarget::post("/b"), "b", None).await?;
            manager.process_queue().await
        });

        draining.await.unwrap().unwrap();
        late.await.unwrap().unwrap();

        // whichever call lost the race, the other one delivered /b
        assert_eq!(h.manager.counts().await, QueueCounts::default());
        assert_eq!(h.sender.call_count(), 2);
    }
}
