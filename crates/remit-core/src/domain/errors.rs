//! Errors - エラー型と分類
//!
//! 層ごとにエラー型を分けています。
//! - `ActivityError`: activity 1 回分の失敗（retry 判定に使う）
//! - `WorkflowError`: workflow コードが受け取るエラー
//! - `HostError`: host の外側（呼び出し側）に返すエラー
//! - `StoreError` / `CodecError`: 永続化とシリアライズ

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::ExecutionId;
use super::status::{ExecutionStatus, QueryRejectCondition};

/// ErrorKind は activity 失敗の分類
///
/// - Transient: 一時的なエラー（リトライ推奨）
/// - Permanent: 恒久的なエラー（リトライ無意味）
/// - Infrastructure: インフラエラー（worker 消失など。リトライする）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Failure of a single activity attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct ActivityError {
    kind: ErrorKind,
    message: String,
}

impl ActivityError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infrastructure, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind != ErrorKind::Permanent
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("execution {0} already exists")]
    AlreadyExists(ExecutionId),

    #[error("execution {0} not found")]
    NotFound(ExecutionId),

    #[error("history i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("history encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode {type_name}: {source}")]
    Encode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("decode {type_name}: {source}")]
    Decode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced to workflow code.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("activity {activity_type} (seq {seq}) failed after {attempts} attempt(s): {last_error}")]
    ActivityExhausted {
        activity_type: String,
        seq: u64,
        attempts: u32,
        last_error: String,
    },

    #[error("no handler registered for activity type {0}")]
    ActivityNotRegistered(String),

    #[error("history mismatch at activity seq {seq}: recorded {recorded}, requested {requested}")]
    NonDeterminism {
        seq: u64,
        recorded: String,
        requested: String,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("history store: {0}")]
    Store(#[from] StoreError),

    #[error("workflow cancelled")]
    Cancelled,

    #[error("host is shutting down")]
    Shutdown,
}

/// Errors returned by the host to its callers.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("execution {0} not found")]
    ExecutionNotFound(ExecutionId),

    #[error("execution {id} is {status}")]
    ExecutionClosed {
        id: ExecutionId,
        status: ExecutionStatus,
    },

    #[error("query rejected: execution {id} is {status} (reject condition {condition})")]
    QueryRejected {
        id: ExecutionId,
        status: ExecutionStatus,
        condition: QueryRejectCondition,
    },

    #[error("execution {id} has no query handler named {name:?}")]
    UnknownQuery { id: ExecutionId, name: String },

    #[error("unknown workflow type {0}")]
    UnknownWorkflowType(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("host is shutting down")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_permanent_errors_are_final() {
        assert!(ActivityError::transient("x").is_retryable());
        assert!(ActivityError::infrastructure("x").is_retryable());
        assert!(!ActivityError::permanent("x").is_retryable());
    }

    #[test]
    fn exhausted_message_names_the_activity() {
        let err = WorkflowError::ActivityExhausted {
            activity_type: "remit.account.apply_deposit.v1".to_string(),
            seq: 3,
            attempts: 500,
            last_error: "Transient: boom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("apply_deposit"));
        assert!(msg.contains("500 attempt(s)"));
    }
}
