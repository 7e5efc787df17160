//! HistoryStore port - 実行履歴の正本（source of truth）
//!
//! # 設計原則
//! - append-only（既存イベントは書き換えない）
//! - 1 execution = 1 ストリーム
//! - host 再起動後は `load` した履歴から workflow を replay する

use async_trait::async_trait;

use crate::domain::{ExecutionId, HistoryEvent, StoreError};

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Create a new stream whose first event is `first`.
    async fn create(&self, id: ExecutionId, first: HistoryEvent) -> Result<(), StoreError>;

    async fn append(&self, id: ExecutionId, event: HistoryEvent) -> Result<(), StoreError>;

    async fn load(&self, id: ExecutionId) -> Result<Vec<HistoryEvent>, StoreError>;

    /// All known executions, oldest first.
    async fn list(&self) -> Result<Vec<ExecutionId>, StoreError>;
}
