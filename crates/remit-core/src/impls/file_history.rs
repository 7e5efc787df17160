//! FileHistoryStore - execution ごとに JSON lines ファイルへ追記する履歴ストア
//!
//! `<dir>/<execution_id>.jsonl` に 1 行 1 イベントで保存します。
//! 追記のたびに `sync_data` するので、戻った時点でディスクに載っています。
//!
//! 追記の途中でプロセスが落ちると最終行が途中で切れます。`load` はその行を捨て、
//! ファイルを最後の完全な行まで切り詰めてから返します。

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::domain::{ExecutionId, HistoryEvent, StoreError};
use crate::ports::HistoryStore;

const EXTENSION: &str = "jsonl";

#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    /// Open (and create if needed) a history directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: ExecutionId) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }

    async fn truncate(&self, id: ExecutionId, len: u64) -> Result<(), StoreError> {
        let file = OpenOptions::new().write(true).open(self.path_for(id)).await?;
        file.set_len(len).await?;
        file.sync_data().await?;
        Ok(())
    }

    fn encode(event: &HistoryEvent) -> Result<Vec<u8>, StoreError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        Ok(line)
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn create(&self, id: ExecutionId, first: HistoryEvent) -> Result<(), StoreError> {
        let line = Self::encode(&first)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path_for(id))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(id),
                _ => StoreError::Io(e),
            })?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn append(&self, id: ExecutionId, event: HistoryEvent) -> Result<(), StoreError> {
        let line = Self::encode(&event)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.path_for(id))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::NotFound(id),
                _ => StoreError::Io(e),
            })?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn load(&self, id: ExecutionId) -> Result<Vec<HistoryEvent>, StoreError> {
        let content = fs::read_to_string(self.path_for(id))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StoreError::NotFound(id),
                _ => StoreError::Io(e),
            })?;

        let mut events = Vec::new();
        let mut intact = 0;
        let mut lines = content.split_inclusive('\n').peekable();
        while let Some(line) = lines.next() {
            if !line.trim().is_empty() {
                match serde_json::from_str(line) {
                    Ok(event) => events.push(event),
                    Err(err) if lines.peek().is_none() => {
                        warn!(execution_id = %id, error = %err, dropped_bytes = line.len(), "dropping torn trailing history line");
                        self.truncate(id, intact as u64).await?;
                        break;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            intact += line.len();
        }
        Ok(events)
    }

    async fn list(&self) -> Result<Vec<ExecutionId>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<ExecutionId>() {
                Ok(id) => ids.push(id),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unrecognised history file"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
