//! Host - workflow execution のライフサイクル管理
//!
//! # 責務
//! - start: `WorkflowStarted` を記録して workflow を起動
//! - signal: `SignalReceived` を記録してから inbox に届ける
//! - query: reject 条件を判定し、workflow が登録した handler を呼ぶ
//! - recover: 保存済みの history から全 execution を replay
//!
//! workflow 本体は execution ごとに 1 つの tokio task で動きます。
//! 同じ execution の signal は 1 本の inbox を通るので、処理は常に逐次です。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::HostConfig;
use super::context::{ContextParts, SignalEnvelope, WorkflowContext};
use super::executor::ActivityExecutor;
use super::query::QueryHandlers;
use super::recorder::HistoryRecorder;
use super::status::{ExecutionDescription, ExecutionState};
use super::worker_loop::WorkerGroup;
use crate::domain::{
    EventKind, ExecutionHistory, ExecutionId, ExecutionStatus, HostError, WorkflowError,
};
use crate::ports::{Clock, HistoryStore, IdGenerator};
use crate::typed::{DynWorkflow, PayloadCodec, Workflow, WorkflowRegistry};

struct ExecutionHandle {
    workflow_type: String,
    recorder: Arc<HistoryRecorder>,
    inbox: mpsc::UnboundedSender<SignalEnvelope>,
    /// Serializes signal acceptance against the terminal event.
    signal_lock: Mutex<()>,
    state: watch::Sender<ExecutionState>,
    cancel: watch::Sender<bool>,
    queries: QueryHandlers,
    /// Flips to true once replay has caught up.
    live: watch::Receiver<bool>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct HostParts {
    pub config: HostConfig,
    pub store: Arc<dyn HistoryStore>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub workflows: WorkflowRegistry,
    pub executor: Arc<ActivityExecutor>,
    pub workers: WorkerGroup,
}

pub struct Host {
    config: HostConfig,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    workflows: WorkflowRegistry,
    executor: Arc<ActivityExecutor>,
    workers: Mutex<Option<WorkerGroup>>,
    executions: RwLock<HashMap<ExecutionId, Arc<ExecutionHandle>>>,
}

impl Host {
    pub(crate) fn from_parts(parts: HostParts) -> Self {
        Self {
            config: parts.config,
            store: parts.store,
            clock: parts.clock,
            ids: parts.ids,
            workflows: parts.workflows,
            executor: parts.executor,
            workers: Mutex::new(Some(parts.workers)),
            executions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Start a new execution of `workflow_type`.
    pub async fn start(&self, workflow_type: &str, input: Value) -> Result<ExecutionId, HostError> {
        let workflow = self
            .workflows
            .get(workflow_type)
            .ok_or_else(|| HostError::UnknownWorkflowType(workflow_type.to_string()))?;

        let id = self.ids.generate_execution_id();
        let recorder = HistoryRecorder::create(
            id,
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            EventKind::WorkflowStarted {
                workflow_type: workflow_type.to_string(),
                input: input.clone(),
            },
        )
        .await?;

        let handle = self.launch(id, workflow, input, &ExecutionHistory::default(), recorder);
        self.executions.write().await.insert(id, handle);
        info!(execution_id = %id, workflow_type, "execution started");
        Ok(id)
    }

    pub async fn start_workflow<W: Workflow>(
        &self,
        input: &W::Input,
    ) -> Result<ExecutionId, HostError> {
        self.start(W::TYPE, PayloadCodec::encode(input)?).await
    }

    /// Persist a signal and deliver it to the execution's inbox.
    pub async fn signal(
        &self,
        id: ExecutionId,
        signal_name: &str,
        payload: Value,
    ) -> Result<(), HostError> {
        let handle = self.handle(id).await?;
        let _guard = handle.signal_lock.lock().await;

        let status = handle.state.borrow().status;
        if !status.is_open() {
            return Err(HostError::ExecutionClosed { id, status });
        }

        handle
            .recorder
            .record(EventKind::SignalReceived {
                signal_name: signal_name.to_string(),
                payload: payload.clone(),
            })
            .await?;

        let envelope = SignalEnvelope {
            name: signal_name.to_string(),
            payload,
        };
        if handle.inbox.send(envelope).is_err() {
            // workflow already returned; its terminal event is about to be written
            debug!(execution_id = %id, signal_name, "signal recorded after workflow returned");
        }
        Ok(())
    }

    /// Answer a query from the handler the workflow registered.
    pub async fn query(&self, id: ExecutionId, name: &str) -> Result<Value, HostError> {
        let handle = self.handle(id).await?;

        let status = handle.state.borrow().status;
        let condition = self.config.query_reject_condition;
        if condition.rejects(status) {
            return Err(HostError::QueryRejected {
                id,
                status,
                condition,
            });
        }

        // a replaying execution would otherwise answer with a partial state;
        // an error means the workflow has returned, which is also settled
        let mut live = handle.live.clone();
        let _ = live.wait_for(|l| *l).await;

        match handle.queries.invoke(name) {
            Some(answer) => Ok(answer?),
            None => Err(HostError::UnknownQuery {
                id,
                name: name.to_string(),
            }),
        }
    }

    pub async fn query_as<T: DeserializeOwned>(
        &self,
        id: ExecutionId,
        name: &str,
    ) -> Result<T, HostError> {
        let value = self.query(id, name).await?;
        Ok(PayloadCodec::decode(value)?)
    }

    /// Request cancellation. The workflow stops at its next suspension point.
    pub async fn cancel(&self, id: ExecutionId) -> Result<(), HostError> {
        let handle = self.handle(id).await?;
        let status = handle.state.borrow().status;
        if !status.is_open() {
            return Err(HostError::ExecutionClosed { id, status });
        }
        handle.cancel.send_replace(true);
        info!(execution_id = %id, "cancellation requested");
        Ok(())
    }

    pub async fn describe(&self, id: ExecutionId) -> Result<ExecutionDescription, HostError> {
        let handle = self.handle(id).await?;
        let state = handle.state.borrow().clone();
        Ok(ExecutionDescription {
            execution_id: id,
            workflow_type: handle.workflow_type.clone(),
            status: state.status,
            history_length: handle.recorder.recorded().await,
            result: state.result,
            error: state.error,
        })
    }

    /// Wait until the execution reaches a terminal status.
    pub async fn await_completion(&self, id: ExecutionId) -> Result<ExecutionState, HostError> {
        let handle = self.handle(id).await?;
        let mut state = handle.state.subscribe();
        let settled = state
            .wait_for(|s| s.status.is_terminal())
            .await
            .map_err(|_| HostError::Shutdown)?
            .clone();
        Ok(settled)
    }

    pub async fn executions(&self) -> Vec<ExecutionId> {
        let mut ids: Vec<ExecutionId> = self.executions.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Replay every stored execution not already loaded.
    ///
    /// Open executions continue from where their history ends. Closed ones are
    /// replayed so their queries answer the last committed state. A history
    /// that cannot be loaded is skipped and the rest are still recovered.
    pub async fn recover(&self) -> Result<Vec<ExecutionId>, HostError> {
        let mut recovered = Vec::new();
        for id in self.store.list().await? {
            if self.executions.read().await.contains_key(&id) {
                continue;
            }

            let history = match self.store.load(id).await {
                Ok(events) => ExecutionHistory::new(events),
                Err(err) => {
                    warn!(execution_id = %id, error = %err, "history could not be loaded, skipping");
                    continue;
                }
            };
            let Some((workflow_type, input)) = history.started() else {
                warn!(execution_id = %id, "history has no start event, skipping");
                continue;
            };
            let Some(workflow) = self.workflows.get(workflow_type) else {
                warn!(execution_id = %id, workflow_type, "no workflow registered for stored execution, skipping");
                continue;
            };

            let recorder = HistoryRecorder::resume(
                id,
                Arc::clone(&self.store),
                Arc::clone(&self.clock),
                history.next_event_id(),
            );
            let handle = self.launch(id, workflow, input.clone(), &history, recorder);
            self.executions.write().await.insert(id, handle);
            debug!(execution_id = %id, status = %history.status(), events = history.event_count(), "execution recovered");
            recovered.push(id);
        }
        info!(count = recovered.len(), "recovery finished");
        Ok(recovered)
    }

    /// Stop all executions and workers. Open histories stay open for `recover()`.
    pub async fn shutdown(&self) {
        let handles: Vec<Arc<ExecutionHandle>> =
            self.executions.write().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            let task = handle
                .task
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(task) = task {
                task.abort();
                let _ = task.await;
            }
        }
        if let Some(workers) = self.workers.lock().await.take() {
            workers.shutdown_and_join().await;
        }
        info!("host stopped");
    }

    async fn handle(&self, id: ExecutionId) -> Result<Arc<ExecutionHandle>, HostError> {
        self.executions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(HostError::ExecutionNotFound(id))
    }

    fn launch(
        &self,
        id: ExecutionId,
        workflow: Arc<dyn DynWorkflow>,
        input: Value,
        history: &ExecutionHistory,
        recorder: HistoryRecorder,
    ) -> Arc<ExecutionHandle> {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        for (name, payload) in history.signals() {
            // the receiver is alive until the context is dropped
            let _ = inbox_tx.send(SignalEnvelope {
                name: name.to_string(),
                payload: payload.clone(),
            });
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (live_tx, live_rx) = watch::channel(false);
        let initial = history
            .terminal()
            .map_or_else(ExecutionState::running, ExecutionState::from_event);
        let already_closed = initial.status.is_terminal();
        let (state_tx, _) = watch::channel(initial);
        let queries = QueryHandlers::default();
        let signals_consumed = Arc::new(AtomicU64::new(0));
        let recorder = Arc::new(recorder);

        let ctx = WorkflowContext::new(ContextParts {
            execution_id: id,
            inbox: inbox_rx,
            recorded: history.activities(),
            signals_consumed: Arc::clone(&signals_consumed),
            replay_cancel_limit: history.cancelled_after(),
            closed: already_closed,
            cancel: cancel_rx,
            queries: queries.clone(),
            live: live_tx,
            recorder: Arc::clone(&recorder),
            executor: Arc::clone(&self.executor),
        });

        let handle = Arc::new(ExecutionHandle {
            workflow_type: workflow.workflow_type().to_string(),
            recorder,
            inbox: inbox_tx,
            signal_lock: Mutex::new(()),
            state: state_tx,
            cancel: cancel_tx,
            queries,
            live: live_rx,
            task: std::sync::Mutex::new(None),
        });

        let task = tokio::spawn(run_execution(
            Arc::clone(&handle),
            workflow,
            ctx,
            input,
            signals_consumed,
            already_closed,
        ));
        *handle.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        handle
    }
}

async fn run_execution(
    handle: Arc<ExecutionHandle>,
    workflow: Arc<dyn DynWorkflow>,
    ctx: WorkflowContext,
    input: Value,
    signals_consumed: Arc<AtomicU64>,
    already_closed: bool,
) {
    let execution_id = handle.recorder.execution_id();
    let result = workflow.run_dyn(ctx, input).await;

    if already_closed {
        debug!(%execution_id, "closed execution replayed");
        return;
    }

    let terminal = match result {
        Ok(result) => EventKind::WorkflowCompleted { result },
        Err(WorkflowError::Cancelled) => EventKind::WorkflowCancelled {
            signals_consumed: signals_consumed.load(Ordering::SeqCst),
        },
        Err(WorkflowError::Shutdown) => {
            info!(%execution_id, "workflow stopped by shutdown, history left open");
            return;
        }
        Err(err) => {
            error!(%execution_id, error = %err, "workflow failed");
            EventKind::WorkflowFailed {
                error: err.to_string(),
            }
        }
    };

    let _guard = handle.signal_lock.lock().await;
    if let Err(err) = handle.recorder.record(terminal.clone()).await {
        error!(%execution_id, error = %err, "failed to record terminal event");
        handle.state.send_replace(ExecutionState {
            status: ExecutionStatus::Failed,
            result: None,
            error: Some(format!("history store: {err}")),
        });
        return;
    }

    let state = ExecutionState::from_event(&terminal);
    info!(%execution_id, status = %state.status, "execution closed");
    handle.state.send_replace(state);
}
