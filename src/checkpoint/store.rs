use super::watermark::WatermarkError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("checkpoint connection lock poisoned")]
    Poisoned,

    #[error("stored checkpoint is corrupt: {0}")]
    Corrupt(#[from] WatermarkError),

    #[error("unsupported checkpoint connection string: {0}")]
    UnsupportedBackend(String),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Durable home of the single watermark string.
///
/// `get` returns `Ok(None)` when nothing has been stored yet. `set` creates
/// the backing resource if needed and replaces the value atomically.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self) -> Result<Option<String>>;
    async fn set(&self, marker: &str) -> Result<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Process-local store, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    marker: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: Mutex::new(Some(marker.into())),
        }
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn get(&self) -> Result<Option<String>> {
        Ok(self.marker.lock().await.clone())
    }

    async fn set(&self, marker: &str) -> Result<()> {
        *self.marker.lock().await = Some(marker.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}
