//! Manager HTTP API against a live server on an ephemeral port

use async_trait::async_trait;
use proxypool::common::lock;
use proxypool::manager::{ProxyTarget, TaskForwarder, TaskReply};
use proxypool::{Manager, ManagerConfig, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Records every target and answers with a fixed status
struct RecordingForwarder {
    status: u16,
    targets: Mutex<Vec<ProxyTarget>>,
}

impl RecordingForwarder {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            targets: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TaskForwarder for RecordingForwarder {
    async fn forward(&self, target: &ProxyTarget, payload: &Value) -> Result<TaskReply> {
        lock(&self.targets).push(target.clone());
        Ok(TaskReply {
            status: self.status,
            body: json!({ "seen": payload }).to_string(),
        })
    }
}

struct TestManager {
    url: String,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl TestManager {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.handle.await.unwrap().unwrap();
    }
}

fn fast_config() -> ManagerConfig {
    ManagerConfig {
        election_interval: 0.05,
        cleanup_interval: 0.05,
        backoff_base: 0.01,
        ..Default::default()
    }
}

async fn start_manager(config: ManagerConfig, forwarder: Arc<dyn TaskForwarder>) -> TestManager {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown, rx) = oneshot::channel::<()>();
    let manager = Manager::with_forwarder(config, forwarder);
    let handle = tokio::spawn(manager.run(listener, async move {
        let _ = rx.await;
    }));
    TestManager {
        url,
        shutdown,
        handle,
    }
}

async fn wait_for_proxies(client: &Client, url: &str, expected: Value) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let body: Value = client
            .get(format!("{}/proxies", url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if body["proxies"] == expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "proxies never became {}, last {}",
            expected,
            body
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_health() {
    let manager = start_manager(fast_config(), RecordingForwarder::new(200)).await;
    let client = Client::new();

    let resp = client
        .get(format!("{}/health", manager.url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok" }));

    manager.stop().await;
}

#[tokio::test]
async fn test_register_uses_transport_address() {
    let manager = start_manager(fast_config(), RecordingForwarder::new(200)).await;
    let client = Client::new();

    let resp = client
        .post(format!("{}/register", manager.url))
        .json(&json!({ "ip": "6.6.6.6", "role": "worker", "port": 7000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["status"], "ok");
    assert_eq!(ack["ip"], "127.0.0.1");
    assert!(ack["now"].as_f64().unwrap() >= 0.0);

    let workers: Value = client
        .get(format!("{}/workers", manager.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let workers = workers.as_object().unwrap();
    assert_eq!(workers.len(), 1);
    assert!(workers.get("6.6.6.6").is_none());
    assert_eq!(workers["127.0.0.1"]["info"]["port"], 7000);
    assert!(workers["127.0.0.1"]["last_seen"].is_number());

    manager.stop().await;
}

#[tokio::test]
async fn test_register_rejects_non_object() {
    let manager = start_manager(fast_config(), RecordingForwarder::new(200)).await;
    let client = Client::new();

    let resp = client
        .post(format!("{}/register", manager.url))
        .header("content-type", "application/json")
        .body("[1, 2, 3]")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());

    manager.stop().await;
}

#[tokio::test]
async fn test_register_ignores_content_type() {
    let manager = start_manager(fast_config(), RecordingForwarder::new(200)).await;
    let client = Client::new();

    let resp = client
        .post(format!("{}/register", manager.url))
        .body(r#"{"role": "worker", "port": 7000}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["status"], "ok");

    let resp = client
        .post(format!("{}/register", manager.url))
        .header("content-type", "text/plain")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("registration metadata"));

    manager.stop().await;
}

#[tokio::test]
async fn test_configured_body_limit_applies() {
    let config = ManagerConfig {
        max_body_bytes: 3 * 1024 * 1024,
        ..fast_config()
    };
    let manager = start_manager(config, RecordingForwarder::new(200)).await;
    let client = Client::new();

    // Above axum's 2 MiB default, below the configured limit
    let padding = "x".repeat(2 * 1024 * 1024 + 512 * 1024);
    let resp = client
        .post(format!("{}/dispatch", manager.url))
        .json(&json!({ "padding": padding }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let resp = client
        .post(format!("{}/register", manager.url))
        .json(&json!({ "port": 7000, "padding": padding }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    manager.stop().await;
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let config = ManagerConfig {
        max_body_bytes: 1024,
        ..fast_config()
    };
    let manager = start_manager(config, RecordingForwarder::new(200)).await;
    let client = Client::new();

    let resp = client
        .post(format!("{}/register", manager.url))
        .json(&json!({ "padding": "x".repeat(4096) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    manager.stop().await;
}

#[tokio::test]
async fn test_dispatch_without_proxies_is_503() {
    let forwarder = RecordingForwarder::new(200);
    let manager = start_manager(fast_config(), forwarder.clone()).await;
    let client = Client::new();

    let resp = client
        .post(format!("{}/dispatch", manager.url))
        .json(&json!({ "job": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "no proxies available" }));
    assert!(lock(&forwarder.targets).is_empty());

    manager.stop().await;
}

#[tokio::test]
async fn test_dispatch_routes_to_declared_port() {
    let forwarder = RecordingForwarder::new(201);
    let manager = start_manager(fast_config(), forwarder.clone()).await;
    let client = Client::new();

    client
        .post(format!("{}/register", manager.url))
        .json(&json!({ "role": "worker", "port": 7000 }))
        .send()
        .await
        .unwrap();
    wait_for_proxies(&client, &manager.url, json!(["127.0.0.1"])).await;

    let resp = client
        .post(format!("{}/dispatch", manager.url))
        .json(&json!({ "job": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["proxy"], "127.0.0.1");
    assert_eq!(body["status"], 201);
    assert_eq!(body["body"], json!({ "seen": { "job": 42 } }).to_string());

    let targets = lock(&forwarder.targets).clone();
    assert_eq!(targets, vec![ProxyTarget::new("127.0.0.1", 7000)]);

    manager.stop().await;
}

#[tokio::test]
async fn test_failing_proxy_gives_502_then_503() {
    let config = ManagerConfig {
        max_fails: 2,
        ..fast_config()
    };
    let manager = start_manager(config, RecordingForwarder::new(500)).await;
    let client = Client::new();

    client
        .post(format!("{}/register", manager.url))
        .json(&json!({ "port": 7000 }))
        .send()
        .await
        .unwrap();
    wait_for_proxies(&client, &manager.url, json!(["127.0.0.1"])).await;

    for _ in 0..2 {
        let resp = client
            .post(format!("{}/dispatch", manager.url))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "dispatch failed");
        assert!(body["detail"].as_str().unwrap().contains("500"));
    }

    let resp = client
        .post(format!("{}/dispatch", manager.url))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "no available proxies" }));

    manager.stop().await;
}

#[tokio::test]
async fn test_silent_worker_is_evicted() {
    let config = ManagerConfig {
        worker_ttl: 0.2,
        ..fast_config()
    };
    let manager = start_manager(config, RecordingForwarder::new(200)).await;
    let client = Client::new();

    client
        .post(format!("{}/register", manager.url))
        .json(&json!({ "port": 7000 }))
        .send()
        .await
        .unwrap();
    wait_for_proxies(&client, &manager.url, json!(["127.0.0.1"])).await;
    wait_for_proxies(&client, &manager.url, json!([])).await;

    let workers: Value = client
        .get(format!("{}/workers", manager.url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(workers, json!({}));

    manager.stop().await;
}
