//! The agent trigger: one request in, one deck and one activity row out.

use crate::config::Storage;
use crate::error::{Error, Result};
use crate::report::{output_file_name, ReportBuilder};
use crate::research::ResearchBundle;
use crate::storage::{processed_row_key, thread_is_active, Entity, PROCESSED_PARTITION};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

pub const SUCCESS_MESSAGE: &str =
    "Successfully processed 4 JSON files from Power Automate and saved PowerPoint to Azure Blob Storage";

/// Status code and JSON body of a trigger response.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentResponse {
    pub status: u16,
    pub body: Value,
}

impl AgentResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into(), "status": "error" }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Generates decks for incoming research and records each request.
#[derive(Clone)]
pub struct AgentService {
    builder: ReportBuilder,
    storage: Storage,
    thread_timeout: Duration,
}

/// Where the generated deck went, or why there is none.
struct Delivery {
    location: Option<String>,
    error: Option<String>,
}

impl AgentService {
    pub fn new(builder: ReportBuilder, storage: Storage, thread_timeout: Duration) -> Self {
        Self {
            builder,
            storage,
            thread_timeout,
        }
    }

    /// Handle a raw request body.
    pub async fn handle(&self, body: &[u8]) -> AgentResponse {
        self.handle_at(body, Utc::now()).await
    }

    /// Handle a request body as if received at `now`.
    pub async fn handle_at(&self, body: &[u8], now: DateTime<Utc>) -> AgentResponse {
        let body: Value = match serde_json::from_slice(body) {
            Ok(body) => body,
            Err(err) => {
                return AgentResponse::error(400, format!("Invalid JSON in request body: {}", err))
            }
        };

        let bundle = match ResearchBundle::from_value(body) {
            Ok(bundle) => bundle,
            Err(Error::Validation(message)) => return AgentResponse::error(400, message),
            Err(err) => return internal_error(err),
        };

        match self.process(&bundle, now).await {
            Ok(body) => AgentResponse::ok(body),
            Err(err) => internal_error(err),
        }
    }

    async fn process(&self, bundle: &ResearchBundle, now: DateTime<Utc>) -> Result<Value> {
        for (key, doc) in bundle.documents() {
            let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
            tracing::info!(input = key, ?keys, "received research document");
        }

        let filename = output_file_name(now);
        let delivery = self.deliver(bundle, &filename).await;

        let [profile, metrics, highlights, industry] = bundle.documents();
        let mut data = Map::new();
        data.insert("company_data1_processed".into(), profile.1.len().into());
        data.insert("company_data2_processed".into(), metrics.1.len().into());
        data.insert("company_data3_processed".into(), highlights.1.len().into());
        data.insert("industry_data_processed".into(), industry.1.len().into());
        data.insert("total_fields".into(), bundle.total_fields().into());
        data.insert("timestamp".into(), iso_timestamp(now).into());
        data.insert("output_location".into(), delivery.location.clone().into());
        if let Some(error) = delivery.error {
            data.insert("generation_error".into(), error.into());
        }
        let data = Value::Object(data);

        self.record(bundle, &data, now).await;

        let mut files_received = Map::new();
        for (key, doc) in bundle.documents() {
            files_received.insert(format!("{}_size", key), doc.len().into());
        }

        Ok(json!({
            "status": "success",
            "message": SUCCESS_MESSAGE,
            "data": data,
            "files_received": files_received,
            "output_file": {
                "filename": filename,
                "blob_path": filename,
                "container": self.storage.blobs.container(),
                "full_url": delivery.location,
            }
        }))
    }

    /// Build and upload the deck. Failures are logged and reported back,
    /// never raised.
    async fn deliver(&self, bundle: &ResearchBundle, filename: &str) -> Delivery {
        let result = async {
            let report = self.builder.build(bundle)?;
            self.storage.blobs.upload(filename, report.bytes).await?;
            Ok::<_, Error>(self.storage.blobs.location(filename))
        }
        .await;

        match result {
            Ok(location) => {
                tracing::info!(
                    container = self.storage.blobs.container(),
                    blob = filename,
                    "presentation saved"
                );
                Delivery {
                    location: Some(location),
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!(%err, "error processing data");
                Delivery {
                    location: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Store the request record. Failures are logged only.
    async fn record(&self, bundle: &ResearchBundle, data: &Value, now: DateTime<Utc>) {
        let result = async {
            let [profile, metrics, highlights, industry] = bundle.documents();
            let entity = Entity::new(PROCESSED_PARTITION, processed_row_key(now))
                .with("CompanyData1Keys", key_list(profile.1)?)
                .with("CompanyData2Keys", key_list(metrics.1)?)
                .with("CompanyData3Keys", key_list(highlights.1)?)
                .with("IndustryDataKeys", key_list(industry.1)?)
                .with("ProcessedData", serde_json::to_string(data)?)
                .with("Timestamp", iso_timestamp(now));
            self.storage.activity.insert(&entity).await
        }
        .await;

        match result {
            Ok(()) => tracing::info!("stored processed data in activity table"),
            Err(err) => tracing::error!(%err, "error storing data in table"),
        }
    }

    /// Whether a conversation thread is still within its timeout.
    pub async fn thread_is_active(&self, thread_id: &str) -> Result<bool> {
        thread_is_active(
            self.storage.activity.as_ref(),
            thread_id,
            self.thread_timeout,
            Utc::now(),
        )
        .await
    }
}

fn internal_error(err: Error) -> AgentResponse {
    tracing::error!(%err, "unexpected error");
    AgentResponse::error(500, format!("Internal server error: {}", err))
}

fn key_list(doc: &Map<String, Value>) -> Result<String> {
    Ok(serde_json::to_string(&doc.keys().collect::<Vec<_>>())?)
}

/// ISO 8601 with microseconds and a `+00:00` offset.
fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_iso_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(iso_timestamp(now), "2024-06-01T08:00:00.000000+00:00");
    }

    #[test]
    fn test_key_list() {
        let doc = serde_json::json!({"b": 1, "a": 2});
        assert_eq!(key_list(doc.as_object().unwrap()).unwrap(), r#"["b","a"]"#);
    }

    #[test]
    fn test_error_body() {
        let res = AgentResponse::error(400, "Missing required files: x");
        assert!(!res.is_success());
        assert_eq!(
            res.body,
            json!({"error": "Missing required files: x", "status": "error"})
        );
    }
}
