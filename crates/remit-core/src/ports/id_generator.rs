//! IdGenerator port - ID 生成の抽象化
//!
//! Clock を使って現在時刻ベースの ULID を生成します。

use crate::domain::ids::{ActivityTaskId, ExecutionId};
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_execution_id(&self) -> ExecutionId;

    fn generate_activity_task_id(&self) -> ActivityTaskId;
}

pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_execution_id(&self) -> ExecutionId {
        ExecutionId::from(self.next_ulid())
    }

    fn generate_activity_task_id(&self) -> ActivityTaskId {
        ActivityTaskId::from(self.next_ulid())
    }
}
