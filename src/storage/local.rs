use super::{ActivityLog, BlobStore, Entity};
use crate::error::{Error, Result};
use async_std::sync::Mutex;
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Blobs and table rows kept on the local filesystem.
///
/// Blobs live under `<root>/<container>/`; table rows are JSON lines in
/// `<root>/<table>.jsonl`.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    container: String,
    table: String,
    lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, container: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            container: container.into(),
            table: table.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self) -> PathBuf {
        self.root.join(&self.container)
    }

    fn table_file(&self) -> PathBuf {
        self.root.join(format!("{}.jsonl", self.table))
    }

    fn read_rows(&self) -> Result<Vec<Entity>> {
        let path = self.table_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&path)?);
        let mut rows = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(entity) => rows.push(entity),
                Err(err) => tracing::warn!(file = %path.display(), line = n + 1, %err, "skipping unreadable row"),
            }
        }
        Ok(rows)
    }
}

fn check_blob_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(Error::Storage(format!("invalid blob name '{}'", name)));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn ensure_container(&self) -> Result<()> {
        fs::create_dir_all(self.container_dir())?;
        Ok(())
    }

    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        check_blob_name(name)?;
        let _guard = self.lock.lock().await;
        fs::create_dir_all(self.container_dir())?;
        let path = self.container_dir().join(name);
        fs::write(&path, &bytes)?;
        tracing::info!(path = %path.display(), size = bytes.len(), "wrote blob");
        Ok(())
    }

    fn location(&self, name: &str) -> String {
        self.container_dir().join(name).display().to_string()
    }

    fn container(&self) -> &str {
        &self.container
    }
}

#[async_trait]
impl ActivityLog for LocalStore {
    async fn ensure_table(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.table_file();
        OpenOptions::new().create(true).append(true).open(path)?;
        Ok(())
    }

    async fn insert(&self, entity: &Entity) -> Result<()> {
        let _guard = self.lock.lock().await;
        let taken = self
            .read_rows()?
            .iter()
            .any(|e| e.partition_key == entity.partition_key && e.row_key == entity.row_key);
        if taken {
            return Err(Error::Storage(format!(
                "entity ({}, {}) already exists in table {}",
                entity.partition_key, entity.row_key, self.table
            )));
        }

        fs::create_dir_all(&self.root)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.table_file())?;
        writeln!(file, "{}", serde_json::to_string(entity)?)?;
        Ok(())
    }

    async fn get(&self, partition_key: &str, row_key: &str) -> Result<Option<Entity>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_rows()?
            .into_iter()
            .find(|e| e.partition_key == partition_key && e.row_key == row_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{thread_is_active, THREAD_PARTITION};
    use chrono::{Duration, TimeZone, Utc};

    fn store(dir: &tempfile::TempDir) -> LocalStore {
        LocalStore::new(dir.path(), "pptx-output", "PPTX_Activity")
    }

    #[async_std::test]
    async fn test_upload_and_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.ensure_container().await.unwrap();
        store.upload("deck.pptx", vec![1, 2, 3]).await.unwrap();

        let path = dir.path().join("pptx-output").join("deck.pptx");
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(store.location("deck.pptx"), path.display().to_string());
        assert_eq!(store.container(), "pptx-output");
    }

    #[async_std::test]
    async fn test_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(&dir).upload("../escape", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[async_std::test]
    async fn test_insert_get_and_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.ensure_table().await.unwrap();

        let row = Entity::new("processed_files", "20240101_000000").with("ProcessedData", "{}");
        store.insert(&row).await.unwrap();
        assert_eq!(store.get("processed_files", "20240101_000000").await.unwrap(), Some(row.clone()));
        assert_eq!(store.get("processed_files", "other").await.unwrap(), None);
        assert!(store.insert(&row).await.is_err());
    }

    #[async_std::test]
    async fn test_thread_activity() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store
            .insert(&Entity::new(THREAD_PARTITION, "t1").with("LastActive", "2024-05-01T12:00:00Z"))
            .await
            .unwrap();
        store
            .insert(&Entity::new(THREAD_PARTITION, "t2").with("LastActive", "soon"))
            .await
            .unwrap();

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 20, 0).unwrap();
        let last = store.thread_last_active("t1").await.unwrap();
        assert_eq!(last, Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        assert_eq!(store.thread_last_active("t2").await.unwrap(), None);
        assert_eq!(store.thread_last_active("missing").await.unwrap(), None);

        assert!(thread_is_active(&store, "t1", Duration::minutes(30), now).await.unwrap());
        assert!(!thread_is_active(&store, "t1", Duration::minutes(10), now).await.unwrap());
        assert!(!thread_is_active(&store, "missing", Duration::minutes(30), now).await.unwrap());
    }
}
