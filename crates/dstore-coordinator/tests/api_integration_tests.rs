//! End-to-end coordinator API tests (spec §6, §8 scenario 1): a real HTTP
//! client driving the real router against an in-memory metadata store and
//! real in-process storage nodes.

mod fake_node;

use std::sync::Arc;
use std::time::Duration;

use dstore_engine::{Engine, EngineConfig};
use dstore_metadata::InMemoryMetadataStore;
use dstore_nodeclient::NodeClient;
use fake_node::FakeNode;
use serde_json::{json, Value};
use sha2::Digest;
use tokio::net::TcpListener;

async fn start_coordinator() -> (String, Arc<Engine>, tokio::task::JoinHandle<()>) {
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let nodeclient = Arc::new(NodeClient::new());
    let engine = Arc::new(Engine::new(metadata, nodeclient, EngineConfig::default()));

    let app = dstore_coordinator::create_router(engine.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind coordinator");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("coordinator server failed");
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    (format!("http://{addr}"), engine, handle)
}

async fn register_fake_node(base_url: &str, client: &reqwest::Client, node_id: &str) -> String {
    let (node_addr, _handle) = FakeNode::empty().spawn().await;
    let resp = client
        .post(format!("{base_url}/api/nodes/register"))
        .json(&json!({ "node_id": node_id, "node_address": node_addr }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    node_addr
}

#[tokio::test]
async fn upload_request_places_replicas_on_the_best_available_nodes() {
    let (base_url, _engine, _handle) = start_coordinator().await;
    let client = reqwest::Client::new();

    register_fake_node(&base_url, &client, "n1").await;
    register_fake_node(&base_url, &client, "n2").await;

    let resp = client
        .post(format!("{base_url}/api/upload/request"))
        .json(&json!({ "filename": "a.txt", "file_size": 11 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["upload_nodes"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn upload_request_without_enough_nodes_returns_service_unavailable() {
    let (base_url, _engine, _handle) = start_coordinator().await;
    let client = reqwest::Client::new();

    register_fake_node(&base_url, &client, "only-one").await;

    let resp = client
        .post(format!("{base_url}/api/upload/request"))
        .json(&json!({ "filename": "a.txt", "file_size": 11 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn full_upload_confirm_download_round_trip() {
    let (base_url, _engine, _handle) = start_coordinator().await;
    let client = reqwest::Client::new();

    register_fake_node(&base_url, &client, "n1").await;
    register_fake_node(&base_url, &client, "n2").await;

    let resp = client
        .post(format!("{base_url}/api/upload/request"))
        .json(&json!({ "filename": "a.txt", "file_size": 11, "replication_factor": 2 }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let file_id = body["file_id"].as_str().unwrap().to_string();
    let upload_nodes = body["upload_nodes"].as_array().unwrap().clone();

    let bytes = b"hello world".to_vec();
    let checksum = format!("{:x}", sha2::Sha256::digest(&bytes));
    for slot in &upload_nodes {
        let upload_url = slot["upload_url"].as_str().unwrap();
        let part = reqwest::multipart::Part::bytes(bytes.clone()).file_name("a.txt");
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = client.post(upload_url).multipart(form).send().await.unwrap();
        assert!(resp.status().is_success());

        let node_id = slot["node_id"].as_str().unwrap();
        let resp = client
            .post(format!("{base_url}/api/upload/confirm"))
            .json(&json!({ "file_id": file_id, "node_id": node_id, "checksum": checksum }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = client.get(format!("{base_url}/api/download/{file_id}")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["download_urls"].as_array().unwrap().len(), 2);
    assert_eq!(body["checksum"].as_str().unwrap(), checksum);

    let resp = client.get(format!("{base_url}/api/files/{file_id}")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["replicas"].as_array().unwrap().len(), 2);

    let resp = client.delete(format!("{base_url}/api/files/{file_id}")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("{base_url}/api/files/{file_id}")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn download_of_unknown_file_is_not_found() {
    let (base_url, _engine, _handle) = start_coordinator().await;
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base_url}/api/download/{}", uuid::Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn system_status_reflects_registered_nodes() {
    let (base_url, _engine, _handle) = start_coordinator().await;
    let client = reqwest::Client::new();
    register_fake_node(&base_url, &client, "n1").await;

    let resp = client.get(format!("{base_url}/api/system/status")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["active_nodes"].as_u64().unwrap(), 1);
    assert_eq!(body["total_nodes"].as_u64().unwrap(), 1);
}
