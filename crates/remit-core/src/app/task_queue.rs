//! TaskQueue - activity task の配送路
//!
//! 名前付きの bounded mpsc。複数の worker が同じ受信側を共有して取り合います。
//! 結果は task ごとの oneshot で executor に返します。

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::domain::{ActivityError, ActivityTaskId, ExecutionId};

/// One attempt of one activity invocation.
#[derive(Debug)]
pub struct ActivityTask {
    pub task_id: ActivityTaskId,
    pub execution_id: ExecutionId,
    pub seq: u64,
    pub attempt: u32,
    pub activity_type: String,
    pub input: Value,
    pub reply: oneshot::Sender<Result<Value, ActivityError>>,
}

#[derive(Debug, thiserror::Error)]
#[error("task queue {0} is closed")]
pub struct QueueClosed(pub String);

pub struct TaskQueue {
    name: String,
    tx: mpsc::Sender<ActivityTask>,
    rx: Arc<Mutex<mpsc::Receiver<ActivityTask>>>,
}

impl TaskQueue {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            name: name.into(),
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn push(&self, task: ActivityTask) -> Result<(), QueueClosed> {
        self.tx
            .send(task)
            .await
            .map_err(|_| QueueClosed(self.name.clone()))
    }

    /// Wait for the next task. Cancel-safe: dropping the future loses nothing.
    pub async fn pop(&self) -> Option<ActivityTask> {
        self.rx.lock().await.recv().await
    }
}
