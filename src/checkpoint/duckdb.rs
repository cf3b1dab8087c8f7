use super::store::{CheckpointError, CheckpointStore, Result};
use async_trait::async_trait;
use chrono::Utc;
use duckdb::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Checkpoint kept as one row of a DuckDB table, keyed by marker name.
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
    name: String,
    location: Option<PathBuf>,
}

impl DuckDbStore {
    pub fn new<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        Self::init(conn, name, Some(path.to_path_buf()))
    }

    /// In-memory database (for testing)
    pub fn in_memory(name: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, name, None)
    }

    fn init(conn: Connection, name: &str, location: Option<PathBuf>) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                name TEXT PRIMARY KEY,
                marker TEXT NOT NULL,
                updated_at TIMESTAMP NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            name: name.to_string(),
            location,
        })
    }
}

#[async_trait]
impl CheckpointStore for DuckDbStore {
    async fn get(&self) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let name = self.name.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| CheckpointError::Poisoned)?;
            let mut stmt = conn.prepare("SELECT marker FROM checkpoints WHERE name = ?")?;
            let mut rows = stmt.query(duckdb::params![name])?;

            let marker = match rows.next()? {
                Some(row) => Some(row.get::<_, String>(0)?),
                None => None,
            };
            Ok::<_, CheckpointError>(marker)
        })
        .await?
    }

    async fn set(&self, marker: &str) -> Result<()> {
        let conn = self.conn.clone();
        let name = self.name.clone();
        let marker = marker.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| CheckpointError::Poisoned)?;
            conn.execute(
                "INSERT OR REPLACE INTO checkpoints (name, marker, updated_at)
                 VALUES (?, ?, to_timestamp(? / 1000000.0))",
                duckdb::params![name, marker, Utc::now().timestamp_micros()],
            )?;
            Ok::<(), CheckpointError>(())
        })
        .await?
    }

    fn describe(&self) -> String {
        match &self.location {
            Some(path) => format!("duckdb://{}#{}", path.display(), self.name),
            None => format!("duckdb://:memory:#{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_no_checkpoint() {
        let store = DuckDbStore::in_memory("marker").unwrap();
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_load_replaces_row() {
        let store = DuckDbStore::in_memory("marker").unwrap();
        store.set("2024-01-01T00:00:00.000Z").await.unwrap();
        store.set("2024-01-02T00:00:00.000Z").await.unwrap();

        assert_eq!(
            store.get().await.unwrap().as_deref(),
            Some("2024-01-02T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn test_markers_are_keyed_by_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/checkpoints.duckdb");

        let anomalies = DuckDbStore::new(&path, "anomalies").unwrap();
        anomalies.set("2024-01-01T00:00:00.000Z").await.unwrap();
        drop(anomalies);

        let other = DuckDbStore::new(&path, "other").unwrap();
        assert!(other.get().await.unwrap().is_none());
        drop(other);

        let reopened = DuckDbStore::new(&path, "anomalies").unwrap();
        assert_eq!(
            reopened.get().await.unwrap().as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
    }
}
