//! Output storage: the generated deck goes to a blob container and a record
//! of each processed request goes to an activity table.
//!
//! Two backends implement the traits here. [`LocalStore`] keeps everything
//! under a directory and needs no credentials; `AzureStore` (feature
//! `azure`) talks to Azure Blob and Table storage over REST.

mod connection;
mod local;

#[cfg(feature = "azure")]
mod azure;

#[cfg(feature = "azure")]
pub use azure::AzureStore;
pub use connection::ConnectionString;
pub use local::LocalStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Partition holding one row per processed request.
pub const PROCESSED_PARTITION: &str = "processed_files";
/// Partition holding conversation thread activity.
pub const THREAD_PARTITION: &str = "thread";
/// Thread row field holding the last activity time.
pub const LAST_ACTIVE_FIELD: &str = "LastActive";

/// One table row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Entity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            properties: Map::new(),
        }
    }

    /// Add a property.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

/// Where generated decks are written.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create the container if it does not exist.
    async fn ensure_container(&self) -> Result<()>;

    /// Write a blob, replacing any existing one with the same name.
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<()>;

    /// Address of a blob for callers to fetch it.
    fn location(&self, name: &str) -> String;

    fn container(&self) -> &str;
}

/// Where request records and thread activity live.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Create the table if it does not exist.
    async fn ensure_table(&self) -> Result<()>;

    /// Insert a new row. Fails if the keys are taken.
    async fn insert(&self, entity: &Entity) -> Result<()>;

    async fn get(&self, partition_key: &str, row_key: &str) -> Result<Option<Entity>>;

    /// When a thread was last active, if it has been seen and the stored
    /// time parses.
    async fn thread_last_active(&self, thread_id: &str) -> Result<Option<DateTime<Utc>>> {
        let Some(entity) = self.get(THREAD_PARTITION, thread_id).await? else {
            return Ok(None);
        };
        let parsed = entity.get_str(LAST_ACTIVE_FIELD).and_then(parse_timestamp);
        if parsed.is_none() {
            tracing::warn!(thread_id, "thread row has no readable LastActive");
        }
        Ok(parsed)
    }
}

/// Whether a thread saw activity within `timeout` of `now`.
pub async fn thread_is_active(
    log: &dyn ActivityLog,
    thread_id: &str,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Result<bool> {
    Ok(log
        .thread_last_active(thread_id)
        .await?
        .is_some_and(|last| now - last <= timeout))
}

/// RFC 3339, or an ISO timestamp without offset taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Row key for a processed request: `YYYYMMDD_HHMMSS`.
pub fn processed_row_key(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_entity_serializes_flat() {
        let entity = Entity::new("p", "r").with("Count", 3).with("Name", "x");
        assert_eq!(
            serde_json::to_value(&entity).unwrap(),
            json!({"PartitionKey": "p", "RowKey": "r", "Count": 3, "Name": "x"})
        );
        let back: Entity = serde_json::from_value(json!({
            "PartitionKey": "p", "RowKey": "r", "Name": "x"
        }))
        .unwrap();
        assert_eq!(back.get_str("Name"), Some("x"));
    }

    #[test]
    fn test_parse_timestamp() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:30:00.000000"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_processed_row_key() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(processed_row_key(now), "20240102_030405");
    }
}
