//! App - execution host
//!
//! ports と typed を組み合わせて、durable な workflow 実行を提供します。
//!
//! # 主要コンポーネント
//! - **HostBuilder**: host の構築とワイヤリング（起動時検証つき）
//! - **Host**: start / signal / query / cancel / recover
//! - **WorkflowContext**: workflow コードから見える API（signal 受信・activity 実行・query 登録）
//! - **ActivityExecutor**: retry・backoff・timeout 付きの activity 呼び出し
//! - **WorkerGroup**: task queue から activity を取り出して実行
//! - **HostConfig**: YAML + 環境変数の設定

pub mod builder;
pub mod config;
pub mod context;
pub mod executor;
pub mod host;
pub mod query;
pub mod recorder;
pub mod status;
pub mod task_queue;
pub mod worker_loop;

pub use self::builder::{BuildError, HostBuilder};
pub use self::config::{ConfigError, HostConfig};
pub use self::context::{SignalEnvelope, WorkflowContext};
pub use self::executor::{ActivityExecutor, Invocation};
pub use self::host::Host;
pub use self::query::QueryHandlers;
pub use self::recorder::HistoryRecorder;
pub use self::status::{ExecutionDescription, ExecutionState};
pub use self::task_queue::{ActivityTask, QueueClosed, TaskQueue};
pub use self::worker_loop::WorkerGroup;
