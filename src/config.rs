//! Runtime settings, read from flags or the environment.

use crate::error::{Error, Result};
use crate::storage::{ActivityLog, BlobStore, LocalStore};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Prefix selecting a local directory as storage.
pub const FILE_PREFIX: &str = "file:";

/// Settings shared by the server and the command line.
#[derive(Clone, Debug, Args)]
pub struct Settings {
    /// Storage connection string. Empty keeps output under
    /// `--local-storage-dir`; `file:<dir>` keeps it under `<dir>`.
    #[arg(
        long = "storage",
        env = "AzureWebJobsStorage",
        default_value = "",
        hide_env_values = true
    )]
    pub storage_connection: String,

    /// Table receiving request records.
    #[arg(long, env = "TABLE_NAME", default_value = "PPTX_Activity")]
    pub table_name: String,

    /// Container receiving generated decks.
    #[arg(long, env = "CONTAINER_NAME", default_value = "pptx-output")]
    pub container_name: String,

    /// PowerPoint template with the research placeholders.
    #[arg(long, env = "PPTX_TEMPLATE", default_value = "template.pptx")]
    pub template: PathBuf,

    /// Minutes after which a conversation thread counts as inactive.
    #[arg(long, env = "ThreadTimeout", default_value = "30")]
    pub thread_timeout: u32,

    /// Directory for local storage.
    #[arg(long, env = "LOCAL_STORAGE_DIR", default_value = ".researchdeck")]
    pub local_storage_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_connection: String::new(),
            table_name: "PPTX_Activity".to_string(),
            container_name: "pptx-output".to_string(),
            template: PathBuf::from("template.pptx"),
            thread_timeout: 30,
            local_storage_dir: PathBuf::from(".researchdeck"),
        }
    }
}

/// Which storage the connection string selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Local(PathBuf),
    Azure(String),
}

/// Opened storage: the same backend usually serves both roles.
#[derive(Clone)]
pub struct Storage {
    pub blobs: Arc<dyn BlobStore>,
    pub activity: Arc<dyn ActivityLog>,
}

impl Settings {
    pub fn backend(&self) -> StorageBackend {
        let conn = self.storage_connection.trim();
        if conn.is_empty() {
            StorageBackend::Local(self.local_storage_dir.clone())
        } else if let Some(path) = conn.strip_prefix(FILE_PREFIX) {
            StorageBackend::Local(PathBuf::from(path))
        } else {
            StorageBackend::Azure(conn.to_string())
        }
    }

    pub fn thread_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.thread_timeout))
    }

    /// Open storage and make sure the container and table exist.
    pub async fn open_storage(&self) -> Result<Storage> {
        let storage = match self.backend() {
            StorageBackend::Local(root) => {
                tracing::info!(root = %root.display(), "using local storage");
                let store = Arc::new(LocalStore::new(root, &self.container_name, &self.table_name));
                Storage {
                    blobs: store.clone(),
                    activity: store,
                }
            }
            StorageBackend::Azure(conn) => self.open_azure(&conn)?,
        };

        // Creation failures are not fatal; the later write reports them.
        if let Err(err) = storage.activity.ensure_table().await {
            tracing::warn!(%err, table = %self.table_name, "could not ensure table");
        }
        if let Err(err) = storage.blobs.ensure_container().await {
            tracing::warn!(%err, container = %self.container_name, "could not ensure container");
        }
        Ok(storage)
    }

    #[cfg(feature = "azure")]
    fn open_azure(&self, conn: &str) -> Result<Storage> {
        let store = Arc::new(crate::storage::AzureStore::from_connection_string(
            conn,
            &self.container_name,
            &self.table_name,
        )?);
        tracing::info!(container = %self.container_name, table = %self.table_name, "using Azure storage");
        Ok(Storage {
            blobs: store.clone(),
            activity: store,
        })
    }

    #[cfg(not(feature = "azure"))]
    fn open_azure(&self, _conn: &str) -> Result<Storage> {
        Err(Error::Config(
            "Azure storage requires the `azure` feature".to_string(),
        ))
    }

    /// Read the template file.
    pub fn load_template(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.template).map_err(|e| {
            Error::Template(format!("cannot read template {}: {}", self.template.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        settings: Settings,
    }

    fn declared_default(id: &str) -> String {
        let cmd = Cli::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == id)
            .unwrap_or_else(|| panic!("no argument {}", id));
        arg.get_default_values()
            .first()
            .map(|v| v.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    #[test]
    fn test_defaults_match_declared_values() {
        let default = Settings::default();
        assert_eq!(declared_default("storage_connection"), default.storage_connection);
        assert_eq!(declared_default("table_name"), default.table_name);
        assert_eq!(declared_default("container_name"), default.container_name);
        assert_eq!(declared_default("template"), default.template.display().to_string());
        assert_eq!(declared_default("thread_timeout"), default.thread_timeout.to_string());
        assert_eq!(
            declared_default("local_storage_dir"),
            default.local_storage_dir.display().to_string()
        );
    }

    #[test]
    fn test_flags_override_environment() {
        let settings = Cli::parse_from([
            "test",
            "--table-name",
            "Runs",
            "--container-name",
            "decks",
            "--thread-timeout",
            "5",
        ])
        .settings;
        assert_eq!(settings.table_name, "Runs");
        assert_eq!(settings.container_name, "decks");
        assert_eq!(settings.thread_timeout, 5);
    }

    #[test]
    fn test_backend_selection() {
        let mut settings = Settings::default();
        assert_eq!(settings.backend(), StorageBackend::Local(".researchdeck".into()));

        settings.storage_connection = "file:/tmp/out".to_string();
        assert_eq!(settings.backend(), StorageBackend::Local("/tmp/out".into()));

        settings.storage_connection = " AccountName=a;SharedAccessSignature=sv=1 ".to_string();
        assert_eq!(
            settings.backend(),
            StorageBackend::Azure("AccountName=a;SharedAccessSignature=sv=1".to_string())
        );
    }

    #[test]
    fn test_thread_timeout() {
        assert_eq!(Settings::default().thread_timeout(), chrono::Duration::minutes(30));
    }

    #[async_std::test]
    async fn test_open_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            storage_connection: format!("file:{}", dir.path().display()),
            ..Settings::default()
        };
        let storage = settings.open_storage().await.unwrap();
        assert_eq!(storage.blobs.container(), "pptx-output");
        assert!(dir.path().join("pptx-output").is_dir());
        assert!(dir.path().join("PPTX_Activity.jsonl").is_file());
    }

    #[test]
    fn test_missing_template() {
        let settings = Settings {
            template: "/nonexistent/deck.pptx".into(),
            ..Settings::default()
        };
        assert!(matches!(settings.load_template(), Err(Error::Template(_))));
    }
}
