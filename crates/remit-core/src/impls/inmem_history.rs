//! InMemoryHistoryStore - 開発用の履歴ストア
//!
//! Clone しても同じ中身を共有するので、テストでは host を作り直して
//! 「再起動」を再現できます。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ExecutionId, HistoryEvent, StoreError};
use crate::ports::HistoryStore;

#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    streams: Arc<Mutex<HashMap<ExecutionId, Vec<HistoryEvent>>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn create(&self, id: ExecutionId, first: HistoryEvent) -> Result<(), StoreError> {
        let mut streams = self.streams.lock().await;
        if streams.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        streams.insert(id, vec![first]);
        Ok(())
    }

    async fn append(&self, id: ExecutionId, event: HistoryEvent) -> Result<(), StoreError> {
        let mut streams = self.streams.lock().await;
        let stream = streams.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        stream.push(event);
        Ok(())
    }

    async fn load(&self, id: ExecutionId) -> Result<Vec<HistoryEvent>, StoreError> {
        let streams = self.streams.lock().await;
        streams.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<ExecutionId>, StoreError> {
        let streams = self.streams.lock().await;
        let mut ids: Vec<ExecutionId> = streams.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
