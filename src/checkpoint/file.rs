use super::store::{CheckpointError, CheckpointStore, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub const DEFAULT_SHARE: &str = "funcstatemarkershare";
pub const DEFAULT_FILE: &str = "Anomalyfuncmarkerfile";

/// Checkpoint kept as a named file inside a named share directory.
///
/// A missing share or file reads as "no checkpoint". Writes go to a
/// temporary sibling and are renamed over the target, so readers see either
/// the old marker or the new one.
#[derive(Debug, Clone)]
pub struct FileShareStore {
    share_dir: PathBuf,
    file_path: PathBuf,
}

impl FileShareStore {
    pub fn new(root: impl AsRef<Path>, share: &str, file: &str) -> Self {
        let share_dir = root.as_ref().join(share);
        let file_path = share_dir.join(file);
        Self {
            share_dir,
            file_path,
        }
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Temporary siblings are named `.{file}.{uuid}.tmp`.
    fn temp_prefix(&self) -> String {
        let file_name = self
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(".{}.", file_name)
    }

    /// Remove temporary siblings left by a write that was interrupted
    /// before its rename.
    async fn sweep_stale_temps(&self) -> std::io::Result<usize> {
        let prefix = self.temp_prefix();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.share_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".tmp") {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn write_marker(&self, marker: &str) -> std::io::Result<()> {
        let tmp_path = self
            .share_dir
            .join(format!("{}{}.tmp", self.temp_prefix(), Uuid::new_v4()));

        let mut tmp = tokio::fs::File::create(&tmp_path).await?;
        tmp.write_all(marker.as_bytes()).await?;
        tmp.sync_all().await?;
        drop(tmp);

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.file_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileShareStore {
    async fn get(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.file_path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(&self.file_path, e)),
        }
    }

    async fn set(&self, marker: &str) -> Result<()> {
        if !tokio::fs::try_exists(&self.share_dir).await.unwrap_or(false) {
            tracing::info!(share = %self.share_dir.display(), "Creating checkpoint share");
            tokio::fs::create_dir_all(&self.share_dir)
                .await
                .map_err(|e| self.io_error(&self.share_dir, e))?;
        }

        match self.sweep_stale_temps().await {
            Ok(0) => {}
            Ok(removed) => tracing::warn!(
                share = %self.share_dir.display(),
                removed,
                "Removed temporary checkpoint files from an interrupted write"
            ),
            Err(e) => tracing::warn!(error = %e, "Could not sweep temporary checkpoint files"),
        }

        self.write_marker(marker)
            .await
            .map_err(|e| self.io_error(&self.file_path, e))?;

        tracing::debug!(path = %self.file_path.display(), marker, "Checkpoint file written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file://{}", self.file_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_share_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = FileShareStore::new(dir.path(), DEFAULT_SHARE, DEFAULT_FILE);
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_creates_share_and_file() {
        let dir = TempDir::new().unwrap();
        let store = FileShareStore::new(dir.path(), "share", "marker");

        store.set("2024-01-01T00:00:00.000Z").await.unwrap();

        assert!(dir.path().join("share").is_dir());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("share/marker")).unwrap(),
            "2024-01-01T00:00:00.000Z"
        );
        assert_eq!(
            store.get().await.unwrap().as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn test_set_replaces_whole_file_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let store = FileShareStore::new(dir.path(), "share", "marker");

        store.set("a much longer previous marker value").await.unwrap();
        store.set("short").await.unwrap();

        assert_eq!(store.get().await.unwrap().as_deref(), Some("short"));

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("share"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1, "temporary files left behind: {:?}", entries);
    }

    #[tokio::test]
    async fn test_set_sweeps_interrupted_temp_files() {
        let dir = TempDir::new().unwrap();
        let share = dir.path().join("share");
        std::fs::create_dir_all(&share).unwrap();
        std::fs::write(share.join(".marker.0b7e2c1d.tmp"), "2024-01-01T00:00").unwrap();
        std::fs::write(share.join("unrelated.tmp"), "keep").unwrap();
        let store = FileShareStore::new(dir.path(), "share", "marker");

        store.set("2024-01-02T00:00:00.000Z").await.unwrap();

        assert!(!share.join(".marker.0b7e2c1d.tmp").exists());
        assert!(share.join("unrelated.tmp").exists());
        assert_eq!(
            store.get().await.unwrap().as_deref(),
            Some("2024-01-02T00:00:00.000Z")
        );
    }
}
