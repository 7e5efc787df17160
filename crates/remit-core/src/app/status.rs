//! Status - execution の状態と describe の結果

use serde::Serialize;
use serde_json::Value;

use crate::domain::{EventKind, ExecutionId, ExecutionStatus};

/// Live status of an execution as the host sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ExecutionState {
    pub fn running() -> Self {
        Self {
            status: ExecutionStatus::Running,
            result: None,
            error: None,
        }
    }

    /// State after `kind`; `running()` for non-terminal events.
    pub fn from_event(kind: &EventKind) -> Self {
        match kind {
            EventKind::WorkflowCompleted { result } => Self {
                status: ExecutionStatus::Completed,
                result: Some(result.clone()),
                error: None,
            },
            EventKind::WorkflowFailed { error } => Self {
                status: ExecutionStatus::Failed,
                result: None,
                error: Some(error.clone()),
            },
            EventKind::WorkflowCancelled { .. } => Self {
                status: ExecutionStatus::Cancelled,
                result: None,
                error: None,
            },
            _ => Self::running(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionDescription {
    pub execution_id: ExecutionId,
    pub workflow_type: String,
    pub status: ExecutionStatus,
    pub history_length: u64,
    pub result: Option<Value>,
    pub error: Option<String>,
}
