pub mod duckdb;
pub mod file;
pub mod store;
pub mod tracker;
pub mod watermark;

use std::path::Path;
use std::sync::Arc;

pub use self::duckdb::DuckDbStore;
pub use file::FileShareStore;
pub use store::{CheckpointError, CheckpointStore, MemoryStore};
pub use tracker::WatermarkTracker;
pub use watermark::Watermark;

/// Open the checkpoint backend named by a connection string.
///
/// Supported forms:
/// - `duckdb://<path>` or `duckdb://:memory:`, row keyed by `file`
/// - `memory://`
/// - `file://<dir>` or a bare directory path, `<dir>/<share>/<file>`
pub fn open_store(
    connection: &str,
    share: &str,
    file: &str,
) -> Result<Arc<dyn CheckpointStore>, CheckpointError> {
    let connection = connection.trim();

    if let Some(path) = connection.strip_prefix("duckdb://") {
        let store = if path == ":memory:" {
            DuckDbStore::in_memory(file)?
        } else {
            DuckDbStore::new(path, file)?
        };
        return Ok(Arc::new(store));
    }

    if connection.starts_with("memory://") {
        return Ok(Arc::new(MemoryStore::new()));
    }

    let root = connection.strip_prefix("file://").unwrap_or(connection);
    if root.is_empty() || root.contains("://") || looks_like_account_string(root) {
        return Err(CheckpointError::UnsupportedBackend(redact(connection)));
    }

    Ok(Arc::new(FileShareStore::new(Path::new(root), share, file)))
}

/// Cloud storage account strings (`Key=Value;Key=Value`) are not local paths.
fn looks_like_account_string(value: &str) -> bool {
    value.contains(';') && value.contains('=')
}

fn redact(connection: &str) -> String {
    match connection.split_once(';') {
        Some((head, _)) => format!("{};…", head),
        None => connection.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_file_store_from_bare_path() {
        let dir = TempDir::new().unwrap();
        let store = open_store(dir.path().to_str().unwrap(), "share", "marker").unwrap();
        store.set("2024-01-01T00:00:00.000Z").await.unwrap();
        assert!(dir.path().join("share/marker").exists());
    }

    #[tokio::test]
    async fn test_open_file_store_from_url() {
        let dir = TempDir::new().unwrap();
        let conn = format!("file://{}", dir.path().display());
        let store = open_store(&conn, "share", "marker").unwrap();
        assert!(store.describe().starts_with("file://"));
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_duckdb_memory_store() {
        let store = open_store("duckdb://:memory:", "share", "marker").unwrap();
        store.set("x").await.unwrap();
        assert_eq!(store.get().await.unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_reject_account_connection_string() {
        let result = open_store(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=c2VjcmV0",
            "share",
            "marker",
        );
        match result {
            Err(CheckpointError::UnsupportedBackend(shown)) => {
                assert!(!shown.contains("AccountKey"));
            }
            _ => panic!("expected unsupported backend"),
        }
    }

    #[test]
    fn test_reject_unknown_scheme() {
        assert!(matches!(
            open_store("s3://bucket/key", "share", "marker"),
            Err(CheckpointError::UnsupportedBackend(_))
        ));
    }
}
