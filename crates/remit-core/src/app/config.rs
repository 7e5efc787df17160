//! Host configuration.
//!
//! YAML で読み込み、`REMIT_*` 環境変数で上書きできます。
//! どのフィールドも省略可能で、省略時は `Default` の値になります。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::{SIGNAL_CHANNEL, TASK_QUEUE};
use crate::domain::QueryRejectCondition;

pub const ENV_TASK_QUEUE: &str = "REMIT_TASK_QUEUE";
pub const ENV_SIGNAL_CHANNEL: &str = "REMIT_SIGNAL_CHANNEL";
pub const ENV_WORKER_COUNT: &str = "REMIT_WORKER_COUNT";
pub const ENV_HISTORY_DIR: &str = "REMIT_HISTORY_DIR";
pub const ENV_QUERY_REJECT_CONDITION: &str = "REMIT_QUERY_REJECT_CONDITION";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Task queue activities are routed to.
    pub task_queue: String,

    /// Signal channel account workflows listen on.
    pub signal_channel: String,

    /// Number of activity workers pulling from the task queue.
    pub worker_count: usize,

    /// Bound of the task queue channel.
    pub task_queue_capacity: usize,

    /// Directory for file-backed history. In-memory history when unset.
    pub history_dir: Option<PathBuf>,

    pub query_reject_condition: QueryRejectCondition,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            task_queue: TASK_QUEUE.to_string(),
            signal_channel: SIGNAL_CHANNEL.to_string(),
            worker_count: 4,
            task_queue_capacity: 1024,
            history_dir: None,
            query_reject_condition: QueryRejectCondition::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidOverride {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl HostConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply `REMIT_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (used by tests).
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_TASK_QUEUE) {
            self.task_queue = v;
        }
        if let Some(v) = lookup(ENV_SIGNAL_CHANNEL) {
            self.signal_channel = v;
        }
        if let Some(v) = lookup(ENV_WORKER_COUNT) {
            self.worker_count = v.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidOverride {
                    key: ENV_WORKER_COUNT,
                    value: v.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(v) = lookup(ENV_HISTORY_DIR) {
            self.history_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_QUERY_REJECT_CONDITION) {
            self.query_reject_condition =
                v.parse().map_err(|e: crate::domain::status::UnknownRejectCondition| {
                    ConfigError::InvalidOverride {
                        key: ENV_QUERY_REJECT_CONDITION,
                        value: v.clone(),
                        reason: e.to_string(),
                    }
                })?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Zero("worker_count"));
        }
        if self.task_queue_capacity == 0 {
            return Err(ConfigError::Zero("task_queue_capacity"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = HostConfig::from_yaml_str(
            "worker_count: 2\nquery_reject_condition: not_open\nhistory_dir: /var/lib/remit\n",
        )
        .unwrap();

        assert_eq!(config.worker_count, 2);
        assert_eq!(config.query_reject_condition, QueryRejectCondition::NotOpen);
        assert_eq!(config.history_dir, Some(PathBuf::from("/var/lib/remit")));
        assert_eq!(config.task_queue, "TRANSFER_MONEY_TASK_QUEUE");
        assert_eq!(config.signal_channel, "TRANSFER_SIGNAL");
        assert_eq!(config.task_queue, TASK_QUEUE);
        assert_eq!(config.signal_channel, SIGNAL_CHANNEL);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            HostConfig::from_yaml_str("worker_count: 0"),
            Err(ConfigError::Zero("worker_count"))
        ));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_WORKER_COUNT, "8"),
            (ENV_QUERY_REJECT_CONDITION, "none"),
            (ENV_SIGNAL_CHANNEL, "OTHER_SIGNAL"),
        ]);

        let config = HostConfig::default()
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.worker_count, 8);
        assert_eq!(config.query_reject_condition, QueryRejectCondition::None);
        assert_eq!(config.signal_channel, "OTHER_SIGNAL");
        assert_eq!(config.history_dir, None);
    }

    #[test]
    fn bad_override_names_the_variable() {
        let err = HostConfig::default()
            .apply_overrides(|k| (k == ENV_WORKER_COUNT).then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_WORKER_COUNT));
    }

    #[test]
    fn reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remit.yaml");
        std::fs::write(&path, "task_queue: ALT_QUEUE\n").unwrap();

        let config = HostConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.task_queue, "ALT_QUEUE");
    }
}
