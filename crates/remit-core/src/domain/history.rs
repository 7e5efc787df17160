//! Execution history: the append-only event log a workflow is replayed from.
//!
//! Design:
//! - History is the single source of truth for an execution.
//! - Signals are recorded when the host accepts them, not when the workflow consumes them.
//! - Activity events are keyed by `seq`, the order in which the workflow requested them.
//!   Replay matches requests to records by `seq` only.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::ExecutionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    WorkflowStarted {
        workflow_type: String,
        input: Value,
    },
    SignalReceived {
        signal_name: String,
        payload: Value,
    },
    ActivityScheduled {
        seq: u64,
        activity_type: String,
        input: Value,
    },
    ActivityAttemptFailed {
        seq: u64,
        attempt: u32,
        error: String,
        /// None when no retry follows.
        retry_in_ms: Option<u64>,
    },
    ActivityCompleted {
        seq: u64,
        result: Value,
    },
    ActivityFailed {
        seq: u64,
        attempts: u32,
        error: String,
    },
    WorkflowCompleted {
        result: Value,
    },
    WorkflowFailed {
        error: String,
    },
    WorkflowCancelled {
        signals_consumed: u64,
    },
}

impl EventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::WorkflowCompleted { .. }
                | EventKind::WorkflowFailed { .. }
                | EventKind::WorkflowCancelled { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// 1-based, dense per execution.
    pub event_id: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// What history says about one activity invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedActivity {
    pub activity_type: String,
    pub failed_attempts: u32,
    /// Last failed attempt had no retry scheduled.
    pub gave_up: bool,
    pub last_error: Option<String>,
    pub outcome: Option<RecordedOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedOutcome {
    Completed(Value),
    Failed { attempts: u32, error: String },
}

/// Read-side view over the events of one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionHistory {
    events: Vec<HistoryEvent>,
}

impl ExecutionHistory {
    pub fn new(events: Vec<HistoryEvent>) -> Self {
        Self { events }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn next_event_id(&self) -> u64 {
        self.events.last().map_or(1, |e| e.event_id + 1)
    }

    /// Workflow type and input from the `WorkflowStarted` event.
    pub fn started(&self) -> Option<(&str, &Value)> {
        self.events.iter().find_map(|e| match &e.kind {
            EventKind::WorkflowStarted {
                workflow_type,
                input,
            } => Some((workflow_type.as_str(), input)),
            _ => None,
        })
    }

    /// Signals in the order the host accepted them.
    pub fn signals(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.events.iter().filter_map(|e| match &e.kind {
            EventKind::SignalReceived {
                signal_name,
                payload,
            } => Some((signal_name.as_str(), payload)),
            _ => None,
        })
    }

    pub fn activities(&self) -> BTreeMap<u64, RecordedActivity> {
        let mut activities: BTreeMap<u64, RecordedActivity> = BTreeMap::new();
        for event in &self.events {
            match &event.kind {
                EventKind::ActivityScheduled {
                    seq, activity_type, ..
                } => {
                    activities.insert(
                        *seq,
                        RecordedActivity {
                            activity_type: activity_type.clone(),
                            failed_attempts: 0,
                            gave_up: false,
                            last_error: None,
                            outcome: None,
                        },
                    );
                }
                EventKind::ActivityAttemptFailed {
                    seq,
                    attempt,
                    error,
                    retry_in_ms,
                } => {
                    if let Some(activity) = activities.get_mut(seq) {
                        activity.failed_attempts = activity.failed_attempts.max(*attempt);
                        activity.gave_up = retry_in_ms.is_none();
                        activity.last_error = Some(error.clone());
                    }
                }
                EventKind::ActivityCompleted { seq, result } => {
                    if let Some(activity) = activities.get_mut(seq) {
                        activity.outcome = Some(RecordedOutcome::Completed(result.clone()));
                    }
                }
                EventKind::ActivityFailed {
                    seq,
                    attempts,
                    error,
                } => {
                    if let Some(activity) = activities.get_mut(seq) {
                        activity.outcome = Some(RecordedOutcome::Failed {
                            attempts: *attempts,
                            error: error.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
        activities
    }

    /// The first terminal event, if the execution is closed.
    pub fn terminal(&self) -> Option<&EventKind> {
        self.events
            .iter()
            .map(|e| &e.kind)
            .find(|kind| kind.is_terminal())
    }

    pub fn status(&self) -> ExecutionStatus {
        match self.terminal() {
            None => ExecutionStatus::Running,
            Some(EventKind::WorkflowCompleted { .. }) => ExecutionStatus::Completed,
            Some(EventKind::WorkflowFailed { .. }) => ExecutionStatus::Failed,
            Some(_) => ExecutionStatus::Cancelled,
        }
    }

    /// Number of signals consumed before cancellation, if cancelled.
    pub fn cancelled_after(&self) -> Option<u64> {
        match self.terminal() {
            Some(EventKind::WorkflowCancelled { signals_consumed }) => Some(*signals_consumed),
            _ => None,
        }
    }
}
