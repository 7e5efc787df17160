//! WorkflowContext - workflow のコードから見える唯一の窓口
//!
//! # replay
//! host は起動時に history を読み、次の 2 つを context に渡します。
//! - 記録済みの signal: inbox に記録順で積み直す
//! - 記録済みの activity: seq ごとの結果
//!
//! workflow が同じ順序で同じ activity を要求する限り、完了済みの activity は
//! 再実行されず記録済みの結果が返ります。記録を使い切った時点から live 実行に戻ります。

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::executor::{ActivityExecutor, Invocation, cancelled};
use super::query::QueryHandlers;
use super::recorder::HistoryRecorder;
use crate::domain::{
    ActivityOptions, EventKind, ExecutionId, RecordedActivity, RecordedOutcome, WorkflowError,
};
use crate::typed::{Activity, PayloadCodec};

/// A signal as delivered to the workflow inbox.
#[derive(Debug, Clone)]
pub struct SignalEnvelope {
    pub name: String,
    pub payload: Value,
}

pub(crate) struct ContextParts {
    pub execution_id: ExecutionId,
    pub inbox: mpsc::UnboundedReceiver<SignalEnvelope>,
    pub recorded: BTreeMap<u64, RecordedActivity>,
    pub signals_consumed: Arc<AtomicU64>,
    pub replay_cancel_limit: Option<u64>,
    pub closed: bool,
    pub cancel: watch::Receiver<bool>,
    pub queries: QueryHandlers,
    pub live: watch::Sender<bool>,
    pub recorder: Arc<HistoryRecorder>,
    pub executor: Arc<ActivityExecutor>,
}

pub struct WorkflowContext {
    execution_id: ExecutionId,
    inbox: mpsc::UnboundedReceiver<SignalEnvelope>,
    /// Signals taken from the inbox while waiting on another name.
    pending: VecDeque<SignalEnvelope>,
    recorded: BTreeMap<u64, RecordedActivity>,
    next_seq: u64,
    signals_consumed: Arc<AtomicU64>,
    /// Set when replaying a cancelled execution: stop after this many signals.
    replay_cancel_limit: Option<u64>,
    /// History already ends in a terminal event: replay only, never go live.
    closed: bool,
    cancel: watch::Receiver<bool>,
    queries: QueryHandlers,
    live: watch::Sender<bool>,
    recorder: Arc<HistoryRecorder>,
    executor: Arc<ActivityExecutor>,
}

impl WorkflowContext {
    pub(crate) fn new(parts: ContextParts) -> Self {
        Self {
            execution_id: parts.execution_id,
            inbox: parts.inbox,
            pending: VecDeque::new(),
            recorded: parts.recorded,
            next_seq: 0,
            signals_consumed: parts.signals_consumed,
            replay_cancel_limit: parts.replay_cancel_limit,
            closed: parts.closed,
            cancel: parts.cancel,
            queries: parts.queries,
            live: parts.live,
            recorder: parts.recorder,
            executor: parts.executor,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// True until the workflow catches up with its history.
    ///
    /// A closed history stays in replay until the workflow returns.
    pub fn is_replaying(&self) -> bool {
        !*self.live.borrow()
    }

    /// Register a query handler. The handler must only read state.
    pub fn set_query_handler<F, R>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Serialize,
    {
        self.queries.set(name, handler);
    }

    /// Wait for the next signal named `name`, oldest first.
    ///
    /// Signals with other names stay buffered in arrival order.
    pub async fn receive_signal(&mut self, name: &str) -> Result<Value, WorkflowError> {
        if let Some(limit) = self.replay_cancel_limit
            && self.signals_consumed.load(Ordering::SeqCst) >= limit
        {
            return Err(WorkflowError::Cancelled);
        }
        if *self.cancel.borrow() {
            return Err(WorkflowError::Cancelled);
        }

        if let Some(pos) = self.pending.iter().position(|s| s.name == name)
            && let Some(signal) = self.pending.remove(pos)
        {
            return Ok(self.consume(signal));
        }

        loop {
            let signal = match self.inbox.try_recv() {
                Ok(signal) => signal,
                Err(TryRecvError::Empty) if self.closed => return Err(self.replay_exhausted()),
                Err(TryRecvError::Empty) => {
                    self.mark_live();
                    tokio::select! {
                        biased;
                        _ = cancelled(&mut self.cancel) => return Err(WorkflowError::Cancelled),
                        signal = self.inbox.recv() => signal.ok_or(WorkflowError::Shutdown)?,
                    }
                }
                Err(TryRecvError::Disconnected) => return Err(WorkflowError::Shutdown),
            };

            if signal.name == name {
                return Ok(self.consume(signal));
            }
            self.pending.push_back(signal);
        }
    }

    /// Run an activity, or return its recorded result when replaying.
    pub async fn execute_activity<A: Activity>(
        &mut self,
        input: A,
        options: &ActivityOptions,
    ) -> Result<A::Output, WorkflowError> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let prior_failures = match self.recorded.remove(&seq) {
            Some(recorded) => match self.replay_recorded::<A>(seq, recorded).await? {
                Replayed::Done(output) => return Ok(PayloadCodec::decode(output)?),
                Replayed::Resume { prior_failures } => prior_failures,
            },
            None => {
                if self.closed {
                    return Err(self.replay_exhausted());
                }
                if !self.executor.is_registered(A::TYPE) {
                    return Err(WorkflowError::ActivityNotRegistered(A::TYPE.to_string()));
                }
                self.recorder
                    .record(EventKind::ActivityScheduled {
                        seq,
                        activity_type: A::TYPE.to_string(),
                        input: PayloadCodec::encode(&input)?,
                    })
                    .await?;
                0
            }
        };

        self.mark_live();
        let invocation = Invocation {
            execution_id: self.execution_id,
            seq,
            activity_type: A::TYPE.to_string(),
            input: PayloadCodec::encode(&input)?,
            options: options.clone(),
            prior_failures,
        };
        let result = self
            .executor
            .execute(invocation, &self.recorder, &mut self.cancel)
            .await?;
        self.recorder
            .record(EventKind::ActivityCompleted {
                seq,
                result: result.clone(),
            })
            .await?;
        Ok(PayloadCodec::decode(result)?)
    }

    async fn replay_recorded<A: Activity>(
        &mut self,
        seq: u64,
        recorded: RecordedActivity,
    ) -> Result<Replayed, WorkflowError> {
        if recorded.activity_type != A::TYPE {
            return Err(WorkflowError::NonDeterminism {
                seq,
                recorded: recorded.activity_type,
                requested: A::TYPE.to_string(),
            });
        }

        match recorded.outcome {
            Some(RecordedOutcome::Completed(output)) => {
                debug!(execution_id = %self.execution_id, seq, activity_type = A::TYPE, "replayed activity result");
                Ok(Replayed::Done(output))
            }
            Some(RecordedOutcome::Failed { attempts, error }) => {
                Err(WorkflowError::ActivityExhausted {
                    activity_type: A::TYPE.to_string(),
                    seq,
                    attempts,
                    last_error: error,
                })
            }
            None if self.closed => Err(self.replay_exhausted()),
            None if recorded.gave_up => {
                // the final failure was recorded but ActivityFailed was not
                let error = recorded.last_error.unwrap_or_default();
                self.recorder
                    .record(EventKind::ActivityFailed {
                        seq,
                        attempts: recorded.failed_attempts,
                        error: error.clone(),
                    })
                    .await?;
                Err(WorkflowError::ActivityExhausted {
                    activity_type: A::TYPE.to_string(),
                    seq,
                    attempts: recorded.failed_attempts,
                    last_error: error,
                })
            }
            None => Ok(Replayed::Resume {
                prior_failures: recorded.failed_attempts,
            }),
        }
    }

    /// A closed history ran out before the workflow returned.
    fn replay_exhausted(&self) -> WorkflowError {
        match self.replay_cancel_limit {
            Some(_) => WorkflowError::Cancelled,
            None => WorkflowError::Shutdown,
        }
    }

    fn consume(&mut self, signal: SignalEnvelope) -> Value {
        self.signals_consumed.fetch_add(1, Ordering::SeqCst);
        signal.payload
    }

    fn mark_live(&self) {
        if !*self.live.borrow() {
            self.live.send_replace(true);
        }
    }
}

enum Replayed {
    Done(Value),
    Resume { prior_failures: u32 },
}
