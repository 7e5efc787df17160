//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryHistoryStore**: 開発・テスト用（プロセス内でのみ永続）
//! - **FileHistoryStore**: execution ごとの JSON lines ファイル（再起動をまたいで永続）

pub mod file_history;
pub mod inmem_history;

pub use self::file_history::FileHistoryStore;
pub use self::inmem_history::InMemoryHistoryStore;
