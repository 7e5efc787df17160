//! remit-core
//!
//! Durable, signal-driven account workflows for money transfers.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, status, retry policy, history, errors）
//! - **ports**: 抽象化レイヤー（HistoryStore, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryHistoryStore, FileHistoryStore）
//! - **typed**: 型付き Activity / Workflow API（Handler, Registry, PayloadCodec）
//! - **app**: execution host（HostBuilder, Host, WorkflowContext, ActivityExecutor, WorkerGroup）
//! - **account**: 送金ワークフロー本体（AccountWorkflow, SignalRouter, AccountService）

pub mod account;
pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;
