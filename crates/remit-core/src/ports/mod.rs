//! Ports - 抽象化レイヤー
//!
//! host が外部に依存する箇所を trait として切り出しています。
//! - HistoryStore: 実行履歴（event log）の正本
//! - Clock: 時刻
//! - IdGenerator: ID 生成

pub mod clock;
pub mod history_store;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::history_store::HistoryStore;
pub use self::id_generator::{IdGenerator, UlidGenerator};
