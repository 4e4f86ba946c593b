use super::{ActivityLog, BlobStore, ConnectionString, Entity};
use crate::error::{Error, Result};
use async_trait::async_trait;
use surf::http::Method;
use surf::{Body, Client, RequestBuilder, Response, StatusCode, Url};

const BLOB_API_VERSION: &str = "2021-08-06";
const TABLE_API_VERSION: &str = "2019-02-02";
const JSON_NO_METADATA: &str = "application/json;odata=nometadata";

/// Azure Blob and Table storage over REST, authorized by SAS.
pub struct AzureStore {
    client: Client,
    connection: ConnectionString,
    container: String,
    table: String,
}

impl AzureStore {
    pub fn new(connection: ConnectionString, container: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            connection,
            container: container.into(),
            table: table.into(),
        }
    }

    /// Build from a connection string.
    pub fn from_connection_string(
        s: &str,
        container: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self::new(ConnectionString::parse(s)?, container, table))
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.connection.blob_endpoint, self.container)
    }

    fn blob_url(&self, name: &str) -> String {
        format!("{}/{}", self.container_url(), encode(name))
    }

    fn table_url(&self, resource: &str) -> String {
        format!("{}/{}", self.connection.table_endpoint, resource)
    }

    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let url = Url::parse(url).map_err(|e| Error::Config(format!("invalid storage URL: {}", e)))?;
        Ok(RequestBuilder::new(method, url))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let req = builder.build();
        tracing::debug!(method = %req.method(), path = req.url().path(), "storage request");
        Ok(self.client.send(req).await?)
    }

    fn table_request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        Ok(self
            .request(method, url)?
            .header("x-ms-version", TABLE_API_VERSION)
            .header("DataServiceVersion", "3.0")
            .header("Accept", JSON_NO_METADATA))
    }
}

/// Turn a non-success response into a storage error with the service's
/// message.
async fn failure(mut res: Response, what: &str) -> Error {
    let status = res.status();
    let body = res.body_string().await.unwrap_or_default();
    Error::Storage(format!("{} failed with {}: {}", what, status, body.trim()))
}

/// Percent-encode everything but unreserved characters.
fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Key literal inside an entity address: quotes doubled, then encoded.
fn key_literal(key: &str) -> String {
    encode(&key.replace('\'', "''"))
}

#[async_trait]
impl BlobStore for AzureStore {
    async fn ensure_container(&self) -> Result<()> {
        let url = self
            .connection
            .signed_with_query(&self.container_url(), "restype=container");
        let builder = self
            .request(Method::Put, &url)?
            .header("x-ms-version", BLOB_API_VERSION);
        let res = self.send(builder).await?;
        match res.status() {
            StatusCode::Created => {
                tracing::info!(container = %self.container, "created container");
                Ok(())
            }
            StatusCode::Conflict => Ok(()),
            _ => Err(failure(res, "create container").await),
        }
    }

    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let size = bytes.len();
        let url = self.connection.signed(&self.blob_url(name));
        let builder = self
            .request(Method::Put, &url)?
            .header("x-ms-version", BLOB_API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header(
                "x-ms-blob-content-type",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            )
            .body(Body::from_bytes(bytes));
        let res = self.send(builder).await?;
        if !res.status().is_success() {
            return Err(failure(res, "upload blob").await);
        }
        tracing::info!(container = %self.container, blob = name, size, "uploaded blob");
        Ok(())
    }

    fn location(&self, name: &str) -> String {
        self.blob_url(name)
    }

    fn container(&self) -> &str {
        &self.container
    }
}

#[async_trait]
impl ActivityLog for AzureStore {
    async fn ensure_table(&self) -> Result<()> {
        let url = self.connection.signed(&self.table_url("Tables"));
        let body = Body::from_json(&serde_json::json!({ "TableName": self.table }))?;
        let builder = self
            .table_request(Method::Post, &url)?
            .header("Prefer", "return-no-content")
            .body(body);
        let res = self.send(builder).await?;
        match res.status() {
            StatusCode::Created | StatusCode::NoContent | StatusCode::Conflict => Ok(()),
            _ => Err(failure(res, "create table").await),
        }
    }

    async fn insert(&self, entity: &Entity) -> Result<()> {
        let url = self.connection.signed(&self.table_url(&encode(&self.table)));
        let builder = self
            .table_request(Method::Post, &url)?
            .header("Prefer", "return-no-content")
            .body(Body::from_json(entity)?);
        let res = self.send(builder).await?;
        match res.status() {
            status if status.is_success() => Ok(()),
            StatusCode::Conflict => Err(Error::Storage(format!(
                "entity ({}, {}) already exists in table {}",
                entity.partition_key, entity.row_key, self.table
            ))),
            _ => Err(failure(res, "insert entity").await),
        }
    }

    async fn get(&self, partition_key: &str, row_key: &str) -> Result<Option<Entity>> {
        let resource = format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            encode(&self.table),
            key_literal(partition_key),
            key_literal(row_key)
        );
        let url = self.connection.signed(&self.table_url(&resource));
        let mut res = self.send(self.table_request(Method::Get, &url)?).await?;
        match res.status() {
            StatusCode::Ok => Ok(Some(res.body_json().await?)),
            StatusCode::NotFound => Ok(None),
            _ => Err(failure(res, "get entity").await),
        }
    }
}

impl std::fmt::Debug for AzureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureStore")
            .field("connection", &self.connection)
            .field("container", &self.container)
            .field("table", &self.table)
            .finish()
    }
}
