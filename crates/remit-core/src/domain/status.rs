//! Execution status and the query reject policy that depends on it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of a workflow execution.
///
/// State transitions:
/// - Running -> Completed (workflow returned Ok)
/// - Running -> Failed (workflow returned an error, e.g. activity retries exhausted)
/// - Running -> Cancelled (host-level cancellation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_open(self) -> bool {
        matches!(self, ExecutionStatus::Running)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_open()
    }

    pub fn completed_cleanly(self) -> bool {
        matches!(self, ExecutionStatus::Completed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// When the host refuses to answer a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRejectCondition {
    /// Always answer.
    None,
    /// Reject unless the execution is still running.
    NotOpen,
    /// Reject failed and cancelled executions; running and completed ones answer.
    #[default]
    NotCompletedCleanly,
}

impl QueryRejectCondition {
    pub fn rejects(self, status: ExecutionStatus) -> bool {
        match self {
            QueryRejectCondition::None => false,
            QueryRejectCondition::NotOpen => !status.is_open(),
            QueryRejectCondition::NotCompletedCleanly => {
                !(status.is_open() || status.completed_cleanly())
            }
        }
    }
}

impl fmt::Display for QueryRejectCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryRejectCondition::None => "none",
            QueryRejectCondition::NotOpen => "not_open",
            QueryRejectCondition::NotCompletedCleanly => "not_completed_cleanly",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown query reject condition {0:?} (expected none, not_open or not_completed_cleanly)")]
pub struct UnknownRejectCondition(String);

impl FromStr for QueryRejectCondition {
    type Err = UnknownRejectCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(QueryRejectCondition::None),
            "not_open" => Ok(QueryRejectCondition::NotOpen),
            "not_completed_cleanly" => Ok(QueryRejectCondition::NotCompletedCleanly),
            _ => Err(UnknownRejectCondition(s.to_string())),
        }
    }
}
