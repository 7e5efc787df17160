//! WorkerGroup - task queue から activity を取り出して実行するワーカー群
//!
//! # フロー
//! 1. TaskQueue::pop() で task を取得
//! 2. ActivityRegistry から activity_type の handler を引く
//! 3. handler を別 task で実行（panic を Transient な失敗として回収）
//! 4. oneshot で結果を executor に返す
//!
//! retry の判断は executor 側。ワーカーは 1 attempt を実行するだけです。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::task_queue::{ActivityTask, TaskQueue};
use crate::domain::ActivityError;
use crate::typed::ActivityRegistry;

/// Worker group handle.
/// - `request_shutdown()` で新しい task の取得を止める
/// - 実行中の handler は最後まで走る
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers on `queue`.
    pub fn spawn(n: usize, queue: Arc<TaskQueue>, registry: Arc<ActivityRegistry>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let reg = Arc::clone(&registry);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, reg, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<TaskQueue>,
    registry: Arc<ActivityRegistry>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    debug!(worker_id, queue = queue.name(), "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let task = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            task = queue.pop() => task,
        };

        let Some(task) = task else {
            break;
        };

        run_task(worker_id, &registry, task).await;
    }
    debug!(worker_id, "worker stopped");
}

async fn run_task(worker_id: usize, registry: &ActivityRegistry, task: ActivityTask) {
    let ActivityTask {
        task_id,
        execution_id,
        seq,
        attempt,
        activity_type,
        input,
        reply,
    } = task;

    let result = match registry.get(&activity_type) {
        None => Err(ActivityError::permanent(format!(
            "no handler registered for activity type {activity_type}"
        ))),
        Some(handler) => {
            match tokio::spawn(async move { handler.handle_dyn(input).await }).await {
                Ok(result) => result,
                Err(join_err) => {
                    warn!(worker_id, %execution_id, seq, attempt, error = %join_err, "activity task aborted");
                    Err(ActivityError::transient(format!("activity task aborted: {join_err}")))
                }
            }
        }
    };

    if reply.send(result).is_err() {
        // executor gave up on this attempt (timeout or cancellation)
        debug!(worker_id, %task_id, %execution_id, seq, attempt, "dropping late activity result");
    }
}
