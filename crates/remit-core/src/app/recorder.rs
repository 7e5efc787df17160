//! HistoryRecorder - 1 execution 分の history への書き込み口
//!
//! event_id の採番と append を同じロックの中で行うので、
//! signal 受付と workflow 本体が同時に書いても ID は欠番・重複しません。

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{EventKind, ExecutionId, HistoryEvent, StoreError};
use crate::ports::{Clock, HistoryStore};

pub struct HistoryRecorder {
    execution_id: ExecutionId,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    next_event_id: Mutex<u64>,
}

impl HistoryRecorder {
    /// Create the stream with `first` as event 1.
    pub async fn create(
        execution_id: ExecutionId,
        store: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
        first: EventKind,
    ) -> Result<Self, StoreError> {
        let event = HistoryEvent {
            event_id: 1,
            recorded_at: clock.now(),
            kind: first,
        };
        store.create(execution_id, event).await?;
        Ok(Self {
            execution_id,
            store,
            clock,
            next_event_id: Mutex::new(2),
        })
    }

    /// Continue an existing stream.
    pub fn resume(
        execution_id: ExecutionId,
        store: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
        next_event_id: u64,
    ) -> Self {
        Self {
            execution_id,
            store,
            clock,
            next_event_id: Mutex::new(next_event_id),
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub async fn record(&self, kind: EventKind) -> Result<u64, StoreError> {
        let mut next = self.next_event_id.lock().await;
        let event_id = *next;
        let event = HistoryEvent {
            event_id,
            recorded_at: self.clock.now(),
            kind,
        };
        self.store.append(self.execution_id, event).await?;
        *next += 1;
        Ok(event_id)
    }

    /// Number of events written so far.
    pub async fn recorded(&self) -> u64 {
        *self.next_event_id.lock().await - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryHistoryStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use ulid::Ulid;

    #[tokio::test]
    async fn event_ids_are_dense() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let id = ExecutionId::from_ulid(Ulid::new());

        let recorder = HistoryRecorder::create(
            id,
            store.clone(),
            clock,
            EventKind::WorkflowStarted {
                workflow_type: "wf".into(),
                input: json!(null),
            },
        )
        .await
        .unwrap();

        let second = recorder
            .record(EventKind::SignalReceived {
                signal_name: "S".into(),
                payload: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(second, 2);
        assert_eq!(recorder.recorded().await, 2);

        let ids: Vec<u64> = store.load(id).await.unwrap().iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
