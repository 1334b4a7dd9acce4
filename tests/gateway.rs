//! End-to-end tests of unary calls, endpoint changes and the admin API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rpc_gateway::journal::{Journal, JournalError};
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn unary_call_echoes_json() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;

    let res = common::client()
        .post(gateway.url("/api/echo"))
        .header("x-tenant", "acme")
        .header("authorization", "Bearer secret")
        .body(r#"{"a":1}"#)
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["content-type"],
        "application/json; charset=utf-8"
    );
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"a": 1}));

    let call = gateway.backend.last_call();
    assert_eq!(call.method, "echo");
    assert!(call
        .metadata
        .contains(&("proxy_method_name".to_string(), "echo".to_string())));
    assert!(call
        .metadata
        .contains(&("x-tenant".to_string(), "acme".to_string())));
    assert!(!call.metadata.iter().any(|(k, _)| k == "authorization"));
}

#[tokio::test]
async fn emptied_endpoint_list_yields_unavailable() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;
    let client = common::client();

    let res = client.post(gateway.url("/api/echo")).body("{}").send().await.unwrap();
    assert_eq!(res.status(), 200);

    gateway
        .config_updates
        .send(common::config_with(&[]))
        .unwrap();

    let mut last = None;
    for _ in 0..50 {
        let res = client.post(gateway.url("/api/echo")).body("{}").send().await.unwrap();
        if res.status() == 503 {
            last = Some(res);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let res = last.expect("pool never became empty");
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "errorMessage": "Service is not available now, please try later",
            "errorCode": "Unavailable",
            "details": [],
        })
    );
}

#[tokio::test]
async fn backend_not_found_renders_default_envelope() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;
    gateway
        .backend
        .fail_unary(tonic::Status::not_found("user 7 not found"));

    let res = common::client()
        .post(gateway.url("/api/users/get"))
        .body(r#"{"id":7}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"errorMessage": "user 7 not found", "errorCode": "NotFound", "details": []})
    );
}

#[tokio::test]
async fn no_endpoints_configured_is_unavailable() {
    let gateway = common::start_gateway(common::config_with(&[])).await;

    let res = common::client()
        .get(gateway.url("/api/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "Unavailable");
}

#[tokio::test]
async fn oversized_body_is_rejected_with_413() {
    let mut config = common::config_with(&["10.0.0.1:9000"]);
    config.transfer.max_request_body_bytes = 16;
    let gateway = common::start_gateway(config).await;

    let res = common::client()
        .post(gateway.url("/api/echo"))
        .body(format!(r#"{{"pad":"{}"}}"#, "x".repeat(64)))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 413);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"errorMessage": "Request body exceeds the limit of 16 bytes"})
    );
    assert!(gateway.backend.calls.lock().unwrap().is_empty());
}

#[derive(Default)]
struct RecordingJournal {
    entries: Mutex<Vec<(String, String)>>,
}

#[tonic::async_trait]
impl Journal for RecordingJournal {
    async fn info(&self, method: &str, _request: &[u8], _response: &[u8]) -> Result<(), JournalError> {
        self.entries.lock().unwrap().push((method.to_string(), "info".to_string()));
        Ok(())
    }

    async fn error(
        &self,
        method: &str,
        _request: &[u8],
        _response: &[u8],
        error: &str,
    ) -> Result<(), JournalError> {
        self.entries.lock().unwrap().push((method.to_string(), error.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn matching_methods_are_journaled() {
    let mut config = common::config_with(&["10.0.0.1:9000"]);
    config.journal.enabled = true;
    config.journal.method_patterns = vec!["orders/*".to_string()];

    let journal = Arc::new(RecordingJournal::default());
    let gateway = common::start_gateway_with(config, journal.clone()).await;
    let client = common::client();

    client.post(gateway.url("/api/orders/create")).body("{}").send().await.unwrap();
    client.post(gateway.url("/api/users/get")).body("{}").send().await.unwrap();

    gateway.backend.fail_unary(tonic::Status::aborted("busy"));
    let res = client.post(gateway.url("/api/orders/cancel")).body("{}").send().await.unwrap();
    assert_eq!(res.status(), 409);

    let mut entries = Vec::new();
    for _ in 0..50 {
        entries = journal.entries.lock().unwrap().clone();
        if entries.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(entries.len(), 2);
    assert!(entries.contains(&("orders/create".to_string(), "info".to_string())));
    assert!(entries
        .iter()
        .any(|(method, outcome)| method == "orders/cancel" && outcome.contains("busy")));
}

#[tokio::test]
async fn admin_api_requires_key_and_manages_endpoints() {
    let mut config = common::config_with(&["10.0.0.1:9000"]);
    config.admin.enabled = true;
    config.admin.api_key = "admin-key".to_string();

    let gateway = common::start_gateway(config).await;
    let admin = common::start_admin(&gateway).await;
    let client = common::client();

    let res = client
        .get(format!("http://{admin}/admin/endpoints"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(format!("http://{admin}/admin/status"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    // The initial dial happens when the server starts serving.
    let _ = client.post(gateway.url("/api/echo")).body("{}").send().await.unwrap();

    let res = client
        .get(format!("http://{admin}/admin/endpoints"))
        .bearer_auth("admin-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"10.0.0.1:9000": "READY"}));

    let res = client
        .put(format!("http://{admin}/admin/endpoints"))
        .bearer_auth("admin-key")
        .json(&json!({"addresses": ["10.0.0.2:9000", "not-an-address"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client
        .put(format!("http://{admin}/admin/endpoints"))
        .bearer_auth("admin-key")
        .json(&json!({"addresses": ["10.0.0.2:9000", "10.0.0.3:9000"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["connected"], true);
    assert_eq!(
        body["endpoints"],
        json!({"10.0.0.2:9000": "READY", "10.0.0.3:9000": "READY"})
    );

    let res = client
        .get(format!("http://{admin}/admin/status"))
        .bearer_auth("admin-key")
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "operational");
    assert_eq!(body["endpoints"], 2);
    assert_eq!(body["active_endpoints"], 2);
}
