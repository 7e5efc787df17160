//! HostBuilder - host の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::sync::Arc;

use super::config::HostConfig;
use super::executor::ActivityExecutor;
use super::host::{Host, HostParts};
use super::task_queue::TaskQueue;
use super::worker_loop::WorkerGroup;
use crate::domain::StoreError;
use crate::impls::{FileHistoryStore, InMemoryHistoryStore};
use crate::ports::{Clock, HistoryStore, IdGenerator, SystemClock, UlidGenerator};
use crate::typed::{Activity, ActivityRegistry, Handler, RegistryError, Workflow, WorkflowRegistry};

/// HostBuilder は Host を構築
///
/// # 使用例
/// ```ignore
/// let host = HostBuilder::new(config)
///     .register_activity::<ApplyDeposit, _>(DepositHandler)?
///     .register_workflow(AccountWorkflow::default())?
///     .expect_activities(&[ApplyDeposit::TYPE, ApplyWithdraw::TYPE])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_activities() で期待される activity_type を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す
pub struct HostBuilder {
    config: HostConfig,
    activities: ActivityRegistry,
    workflows: WorkflowRegistry,
    store: Option<Arc<dyn HistoryStore>>,
    clock: Arc<dyn Clock>,
    expected_activities: Option<Vec<String>>,
}

/// BuildError は host 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing activity types: {0:?}. These activities were expected but not registered.")]
    MissingActivityTypes(Vec<String>),

    #[error("failed to open history store: {0}")]
    Store(#[from] StoreError),
}

impl HostBuilder {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            activities: ActivityRegistry::new(),
            workflows: WorkflowRegistry::new(),
            store: None,
            clock: Arc::new(SystemClock),
            expected_activities: None,
        }
    }

    pub fn register_activity<A: Activity, H: Handler<A> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.activities.register::<A, H>(handler)?;
        Ok(self)
    }

    pub fn register_workflow<W: Workflow>(mut self, workflow: W) -> Result<Self, RegistryError> {
        self.workflows.register(workflow)?;
        Ok(self)
    }

    /// Use `store` instead of the one `HostConfig::history_dir` selects.
    pub fn with_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn expect_activities(mut self, activity_types: &[&str]) -> Self {
        self.expected_activities = Some(activity_types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Validate registrations and start the worker group.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Host, BuildError> {
        if let Some(expected) = &self.expected_activities {
            let registered = self.activities.registered_types();
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !registered.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingActivityTypes(missing));
            }
        }

        let store: Arc<dyn HistoryStore> = match (self.store, &self.config.history_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileHistoryStore::open(dir)?),
            (None, None) => Arc::new(InMemoryHistoryStore::new()),
        };

        let registry = Arc::new(self.activities);
        let queue = Arc::new(TaskQueue::new(
            self.config.task_queue.clone(),
            self.config.task_queue_capacity,
        ));
        let workers = WorkerGroup::spawn(
            self.config.worker_count,
            Arc::clone(&queue),
            Arc::clone(&registry),
        );
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&self.clock)));
        let executor = Arc::new(ActivityExecutor::new(queue, registry, Arc::clone(&ids)));

        Ok(Host::from_parts(HostParts {
            config: self.config,
            store,
            clock: self.clock,
            ids,
            workflows: self.workflows,
            executor,
            workers,
        }))
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}
