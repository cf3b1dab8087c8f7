use super::store::{CheckpointStore, Result};
use super::watermark::Watermark;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Sole writer of the persisted watermark.
///
/// Every advance re-reads the stored value under a lock and only writes when
/// the candidate is strictly newer, so concurrent units can finish in any
/// order without moving the watermark backwards.
pub struct WatermarkTracker {
    store: Arc<dyn CheckpointStore>,
    current: Mutex<Option<Watermark>>,
}

impl WatermarkTracker {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            current: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Read the persisted watermark. Blank markers read as absent; anything
    /// else that does not parse is a corrupt checkpoint.
    pub async fn load(&self) -> Result<Option<Watermark>> {
        let mut current = self.current.lock().await;
        let stored = self.read_stored().await?;
        *current = stored;

        match stored {
            Some(wm) => tracing::info!(watermark = %wm, store = %self.store.describe(), "Loaded checkpoint"),
            None => tracing::info!(store = %self.store.describe(), "No checkpoint found"),
        }
        Ok(stored)
    }

    /// Persist `candidate` if it is strictly greater than the stored
    /// watermark. Returns whether a write happened.
    pub async fn advance(&self, candidate: Watermark) -> Result<bool> {
        let mut current = self.current.lock().await;
        let stored = self.read_stored().await?;
        let latest = stored.max(*current);

        if let Some(latest) = latest {
            if candidate <= latest {
                tracing::debug!(
                    candidate = %candidate,
                    current = %latest,
                    "Checkpoint not advanced, candidate is not newer"
                );
                *current = Some(latest);
                return Ok(false);
            }
        }

        self.store.set(&candidate.to_string()).await?;
        *current = Some(candidate);
        tracing::info!(watermark = %candidate, "Checkpoint advanced");
        Ok(true)
    }

    /// Last watermark loaded or written through this tracker.
    pub async fn current(&self) -> Option<Watermark> {
        *self.current.lock().await
    }

    async fn read_stored(&self) -> Result<Option<Watermark>> {
        match self.store.get().await? {
            Some(raw) if !raw.trim().is_empty() => Ok(Some(Watermark::parse(&raw)?)),
            _ => Ok(None),
        }
    }
}
