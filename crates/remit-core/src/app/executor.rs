//! ActivityExecutor - activity 1 回の呼び出しを retry 込みで完了させる
//!
//! attempt ごとに task を queue に積み、start-to-close timeout 付きで結果を待ちます。
//! 失敗したら `ActivityAttemptFailed` を記録し、RetryPolicy の backoff だけ待って積み直す。
//! Permanent な失敗か maximum_attempts 到達で諦め、`ActivityFailed` を記録します。

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tracing::{error, warn};

use super::recorder::HistoryRecorder;
use super::task_queue::{ActivityTask, TaskQueue};
use crate::domain::{ActivityError, ActivityOptions, EventKind, ExecutionId, WorkflowError};
use crate::ports::IdGenerator;
use crate::typed::ActivityRegistry;

/// One activity invocation as requested by workflow code.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub execution_id: ExecutionId,
    pub seq: u64,
    pub activity_type: String,
    pub input: Value,
    pub options: ActivityOptions,
    /// Failed attempts already in history (non-zero when resuming).
    pub prior_failures: u32,
}

pub struct ActivityExecutor {
    queue: Arc<TaskQueue>,
    registry: Arc<ActivityRegistry>,
    ids: Arc<dyn IdGenerator>,
}

impl ActivityExecutor {
    pub fn new(
        queue: Arc<TaskQueue>,
        registry: Arc<ActivityRegistry>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            queue,
            registry,
            ids,
        }
    }

    pub fn is_registered(&self, activity_type: &str) -> bool {
        self.registry.contains(activity_type)
    }

    /// Run attempts until success, a final failure or cancellation.
    ///
    /// `ActivityScheduled` must already be recorded; the caller records
    /// `ActivityCompleted` on success.
    pub async fn execute(
        &self,
        invocation: Invocation,
        recorder: &HistoryRecorder,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Value, WorkflowError> {
        let Invocation {
            execution_id,
            seq,
            activity_type,
            input,
            options,
            prior_failures,
        } = invocation;
        let policy = &options.retry_policy;
        let mut attempt = prior_failures + 1;

        loop {
            let (reply, reply_rx) = oneshot::channel();
            let task = ActivityTask {
                task_id: self.ids.generate_activity_task_id(),
                execution_id,
                seq,
                attempt,
                activity_type: activity_type.clone(),
                input: input.clone(),
                reply,
            };
            self.queue
                .push(task)
                .await
                .map_err(|_| WorkflowError::Shutdown)?;

            let outcome = tokio::select! {
                biased;
                _ = cancelled(cancel) => return Err(WorkflowError::Cancelled),
                outcome = tokio::time::timeout(options.start_to_close_timeout, reply_rx) => outcome,
            };

            let err = match outcome {
                Ok(Ok(Ok(result))) => return Ok(result),
                Ok(Ok(Err(err))) => err,
                Ok(Err(_)) => ActivityError::infrastructure("worker dropped the task"),
                Err(_) => ActivityError::transient(format!(
                    "start-to-close timeout of {:?} exceeded",
                    options.start_to_close_timeout
                )),
            };

            let retry_in = (err.is_retryable() && policy.allows_retry(attempt))
                .then(|| policy.next_delay(attempt));

            recorder
                .record(EventKind::ActivityAttemptFailed {
                    seq,
                    attempt,
                    error: err.to_string(),
                    retry_in_ms: retry_in.map(|d| d.as_millis() as u64),
                })
                .await?;

            let Some(delay) = retry_in else {
                error!(%execution_id, seq, %activity_type, attempt, error = %err, "activity failed");
                recorder
                    .record(EventKind::ActivityFailed {
                        seq,
                        attempts: attempt,
                        error: err.to_string(),
                    })
                    .await?;
                return Err(WorkflowError::ActivityExhausted {
                    activity_type,
                    seq,
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            };

            warn!(%execution_id, seq, %activity_type, attempt, retry_in = ?delay, error = %err, "activity attempt failed");

            tokio::select! {
                biased;
                _ = cancelled(cancel) => return Err(WorkflowError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

/// Resolves once cancellation is requested. Never resolves if the sender is gone.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, RetryPolicy};
    use crate::impls::InMemoryHistoryStore;
    use crate::ports::{HistoryStore, SystemClock, UlidGenerator};
    use crate::typed::{Activity, Handler};
    use crate::app::WorkerGroup;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use ulid::Ulid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Flaky;

    impl Activity for Flaky {
        const TYPE: &'static str = "test.flaky.v1";
        type Output = u32;
    }

    struct FlakyHandler {
        calls: Arc<AtomicU32>,
        fail_first: u32,
        kind: ErrorKind,
    }

    #[async_trait]
    impl Handler<Flaky> for FlakyHandler {
        async fn handle(&self, _input: Flaky) -> Result<u32, ActivityError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                return Err(ActivityError::new(self.kind, format!("call {call} failed")));
            }
            Ok(call)
        }
    }

    struct Fixture {
        executor: ActivityExecutor,
        recorder: HistoryRecorder,
        store: Arc<InMemoryHistoryStore>,
        calls: Arc<AtomicU32>,
        workers: WorkerGroup,
    }

    async fn fixture(fail_first: u32, kind: ErrorKind) -> Fixture {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = ActivityRegistry::new();
        registry
            .register::<Flaky, _>(FlakyHandler {
                calls: calls.clone(),
                fail_first,
                kind,
            })
            .unwrap();
        let registry = Arc::new(registry);
        let queue = Arc::new(TaskQueue::new("Q", 16));
        let workers = WorkerGroup::spawn(1, queue.clone(), registry.clone());

        let store = Arc::new(InMemoryHistoryStore::new());
        let execution_id = ExecutionId::from_ulid(Ulid::new());
        let recorder = HistoryRecorder::create(
            execution_id,
            store.clone(),
            Arc::new(SystemClock),
            EventKind::WorkflowStarted {
                workflow_type: "wf".into(),
                input: json!(null),
            },
        )
        .await
        .unwrap();

        Fixture {
            executor: ActivityExecutor::new(queue, registry, Arc::new(UlidGenerator::new(SystemClock))),
            recorder,
            store,
            calls,
            workers,
        }
    }

    fn invocation(execution_id: ExecutionId, max_attempts: u32) -> Invocation {
        Invocation {
            execution_id,
            seq: 0,
            activity_type: Flaky::TYPE.to_string(),
            input: json!(null),
            options: ActivityOptions {
                start_to_close_timeout: Duration::from_secs(5),
                retry_policy: RetryPolicy {
                    initial_interval: Duration::from_millis(1),
                    backoff_coefficient: 2.0,
                    maximum_interval: Duration::from_millis(5),
                    maximum_attempts: max_attempts,
                },
            },
            prior_failures: 0,
        }
    }

    async fn failed_attempts(f: &Fixture) -> usize {
        f.store
            .load(f.recorder.execution_id())
            .await
            .unwrap()
            .iter()
            .filter(|e| matches!(e.kind, EventKind::ActivityAttemptFailed { .. }))
            .count()
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let f = fixture(3, ErrorKind::Transient).await;
        let (_tx, mut cancel) = watch::channel(false);

        let out = f
            .executor
            .execute(invocation(f.recorder.execution_id(), 10), &f.recorder, &mut cancel)
            .await
            .unwrap();

        assert_eq!(out, json!(4));
        assert_eq!(f.calls.load(Ordering::SeqCst), 4);
        assert_eq!(failed_attempts(&f).await, 3);
        f.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let f = fixture(1, ErrorKind::Permanent).await;
        let (_tx, mut cancel) = watch::channel(false);

        let err = f
            .executor
            .execute(invocation(f.recorder.execution_id(), 10), &f.recorder, &mut cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::ActivityExhausted { attempts: 1, .. }));
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        f.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn gives_up_at_maximum_attempts() {
        let f = fixture(u32::MAX, ErrorKind::Transient).await;
        let (_tx, mut cancel) = watch::channel(false);

        let err = f
            .executor
            .execute(invocation(f.recorder.execution_id(), 3), &f.recorder, &mut cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::ActivityExhausted { attempts: 3, .. }));
        assert_eq!(f.calls.load(Ordering::SeqCst), 3);
        assert_eq!(failed_attempts(&f).await, 3);
        f.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn resumed_invocation_continues_attempt_count() {
        let f = fixture(u32::MAX, ErrorKind::Transient).await;
        let (_tx, mut cancel) = watch::channel(false);
        let mut inv = invocation(f.recorder.execution_id(), 3);
        inv.prior_failures = 2;

        let err = f
            .executor
            .execute(inv, &f.recorder, &mut cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::ActivityExhausted { attempts: 3, .. }));
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
        f.workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let f = fixture(u32::MAX, ErrorKind::Transient).await;
        let (tx, mut cancel) = watch::channel(false);
        let mut inv = invocation(f.recorder.execution_id(), 0);
        inv.options.retry_policy.initial_interval = Duration::from_secs(3600);
        inv.options.retry_policy.maximum_interval = Duration::from_secs(3600);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(true).unwrap();
        });

        let err = f
            .executor
            .execute(inv, &f.recorder, &mut cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled));

        canceller.await.unwrap();
        f.workers.shutdown_and_join().await;
    }
}
