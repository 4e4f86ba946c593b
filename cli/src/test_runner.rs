#![cfg(test)]

//! Round trips through a live trigger server backed by local storage.

use super::server::{ServeOptions, TRIGGER_ROUTE};
use async_std::task::{sleep, spawn};
use portpicker::pick_unused_port;
use researchdeck::Settings;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use surf::{http::StatusCode, Client};

fn request_body() -> Value {
    json!({
        "CompanyReseachData1": {"data": [{"Company Name": "Contoso", "Headquarters": "Redmond"}]},
        "CompanyReseachData2": {"Total Revenue": "$1,500,000", "Employees": 1200},
        "CompanyReseachData3": {"News": [{"Headline": "Contoso opens a plant", "Date": "2024-02-15"}]},
        "IndustryResearch": {"BenefitTable": [{"Challenge": "Manual work", "KPI": "Hours saved"}]}
    })
}

async fn start_server(storage_dir: &Path) -> Client {
    let port = pick_unused_port().unwrap();
    let opt = ServeOptions {
        port,
        settings: Settings {
            storage_connection: format!("file:{}", storage_dir.display()),
            template: storage_dir.join("missing-template.pptx"),
            ..Settings::default()
        },
    };
    spawn(async move {
        opt.serve().await.unwrap();
        tracing::warn!("server exited");
    });

    let client: Client = surf::Config::default()
        .set_base_url(format!("http://localhost:{port}").parse().unwrap())
        .try_into()
        .unwrap();
    wait_for_server(&client).await;
    client
}

async fn wait_for_server(client: &Client) {
    const MAX_CONNECT_RETRIES: usize = 60;

    for _ in 0..MAX_CONNECT_RETRIES {
        match client.get("/health").await {
            Ok(_) => return,
            Err(err) => {
                tracing::warn!("waiting for server to start: {err}");
                sleep(Duration::from_millis(250)).await;
            }
        }
    }
    panic!("timed out waiting for server");
}

async fn post(client: &Client, body: &Value) -> (StatusCode, Value) {
    let mut res = client
        .post(TRIGGER_ROUTE)
        .body_json(body)
        .unwrap()
        .await
        .unwrap();
    (res.status(), res.body_json().await.unwrap())
}

#[async_std::test]
async fn trigger_generates_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let client = start_server(dir.path()).await;

    let (status, body) = post(&client, &request_body()).await;
    assert_eq!(status, StatusCode::Ok, "{body}");
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["total_fields"], 5);
    assert_eq!(body["files_received"]["CompanyReseachData2_size"], 2);
    assert_eq!(body["output_file"]["container"], "pptx-output");

    let filename = body["output_file"]["filename"].as_str().unwrap();
    assert!(filename.starts_with("POC_") && filename.ends_with(".pptx"));
    let location = body["data"]["output_location"].as_str().unwrap();
    assert_eq!(body["output_file"]["full_url"], location);
    let deck = std::fs::read(location).unwrap();
    assert!(deck.starts_with(b"PK"));

    let table = std::fs::read_to_string(dir.path().join("PPTX_Activity.jsonl")).unwrap();
    let row: Value = serde_json::from_str(table.lines().next().unwrap()).unwrap();
    assert_eq!(row["PartitionKey"], "processed_files");
    assert_eq!(row["CompanyData2Keys"], r#"["Total Revenue","Employees"]"#);
}

#[async_std::test]
async fn trigger_rejects_bad_requests() {
    let dir = tempfile::tempdir().unwrap();
    let client = start_server(dir.path()).await;

    let (status, body) = post(&client, &json!({"CompanyReseachData1": {}})).await;
    assert_eq!(status, StatusCode::BadRequest);
    assert_eq!(
        body["error"],
        "Missing required files: CompanyReseachData2, CompanyReseachData3, IndustryResearch"
    );

    let mut res = client
        .post(TRIGGER_ROUTE)
        .body(surf::Body::from_bytes(vec![0xff, 0xfe, b'{', b'}']))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BadRequest);
    let body: Value = res.body_json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid JSON in request body"));

    let mut res = client.get(TRIGGER_ROUTE).await.unwrap();
    assert_eq!(res.status(), StatusCode::BadRequest);
    let body: Value = res.body_json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid JSON in request body"));
}
