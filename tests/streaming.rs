//! End-to-end tests of multipart uploads and file downloads.

use std::sync::atomic::Ordering;

use reqwest::multipart::{Form, Part};
use rpc_gateway::rpc::frames::{self, BeginFile};
use rpc_gateway::rpc::Message;
use rpc_gateway::GatewayError;
use serde_json::{json, Value};

mod common;

fn file_header(name: &str, content_type: &str, length: i64) -> Message {
    BeginFile {
        file_name: name.to_string(),
        content_type: content_type.to_string(),
        content_length: length,
        ..Default::default()
    }
    .to_message()
}

#[tokio::test]
async fn upload_streams_file_in_buffer_sized_chunks() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;
    gateway
        .backend
        .script_stream(vec![Ok(Some(Message::from_json(&json!({"id": "f-1"}))))]);

    let form = Form::new().text("owner", "alice").part(
        "doc",
        Part::bytes(vec![0x5a; 10 * 1024])
            .file_name("doc.bin")
            .mime_str("application/octet-stream")
            .unwrap(),
    );

    let res = common::client()
        .post(gateway.url("/api/files/upload"))
        .multipart(form)
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["content-type"],
        "application/json; charset=utf-8"
    );
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!([{"id": "f-1"}]));

    let sent = gateway.backend.sent_frames();
    assert_eq!(sent.len(), 5);

    let header = BeginFile::from_message(&sent[0]).unwrap();
    assert_eq!(header.file_name, "doc.bin");
    assert_eq!(header.form_data_name, "doc");
    assert_eq!(header.content_type, "application/octet-stream");
    assert_eq!(header.content_length, 10 * 1024);
    assert_eq!(header.form_data["owner"], "alice");

    let sizes: Vec<usize> = sent[1..4]
        .iter()
        .map(|frame| frame.as_bytes().unwrap().len())
        .collect();
    assert_eq!(sizes, [4096, 4096, 2048]);
    assert!(frames::is_end_of_file(&sent[4]));
    assert!(gateway.backend.half_closed.load(Ordering::SeqCst));

    assert_eq!(gateway.backend.last_call().method, "files/upload");
}

#[tokio::test]
async fn upload_backend_error_is_mapped() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;
    gateway.backend.script_stream(vec![Err(GatewayError::Rpc(
        tonic::Status::resource_exhausted("disk full"),
    ))]);

    let form = Form::new().part("doc", Part::bytes(b"abc".to_vec()).file_name("a.txt"));
    let res = common::client()
        .post(gateway.url("/api/files/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 429);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "ResourceExhausted");
    assert_eq!(body["errorMessage"], "disk full");
}

#[tokio::test]
async fn download_relays_file_with_headers() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;
    gateway.backend.script_stream(vec![
        Ok(Some(file_header("report.pdf", "application/pdf", 2048))),
        Ok(Some(Message::bytes(vec![1u8; 1024]))),
        Ok(Some(Message::bytes(vec![2u8; 1024]))),
        Ok(Some(frames::end_of_file())),
    ]);

    let res = common::client()
        .post(gateway.url("/api/reports/get"))
        .header("expect-file", "true")
        .body(r#"{"id": 7}"#)
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["content-disposition"],
        "attachment; filename=report.pdf"
    );
    assert_eq!(res.headers()["content-type"], "application/pdf");
    assert_eq!(res.headers()["content-length"], "2048");

    let body = res.bytes().await.unwrap();
    assert_eq!(body.len(), 2048);
    assert!(body[..1024].iter().all(|b| *b == 1));
    assert!(body[1024..].iter().all(|b| *b == 2));

    let sent = gateway.backend.sent_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_json(), Some(json!({"id": 7})));
    assert!(gateway.backend.half_closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn download_without_body_sends_no_request_frame() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;
    gateway.backend.script_stream(vec![
        Ok(Some(file_header("export.csv", "text/csv", 0))),
        Ok(Some(Message::bytes(&b"a,b\n1,2\n"[..]))),
        Ok(Some(frames::end_of_file())),
    ]);

    let res = common::client()
        .get(gateway.url("/api/export"))
        .header("expect-file", "true")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(res.headers().get("content-length").is_none());
    assert_eq!(res.text().await.unwrap(), "a,b\n1,2\n");
    assert!(gateway.backend.sent_frames().is_empty());
}

#[tokio::test]
async fn download_rejects_non_json_body() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;

    let res = common::client()
        .post(gateway.url("/api/reports/get"))
        .header("expect-file", "true")
        .body("id=7")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"errorMessage": "Invalid json format. Expected object or array"})
    );
}

#[tokio::test]
async fn download_status_before_header_is_mapped() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;
    gateway
        .backend
        .script_stream(vec![Err(GatewayError::Rpc(tonic::Status::not_found(
            "no such report",
        )))]);

    let res = common::client()
        .post(gateway.url("/api/reports/get"))
        .header("expect-file", "true")
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["errorCode"], "NotFound");
}

#[tokio::test]
async fn download_protocol_violation_hides_cause() {
    let gateway = common::start_gateway(common::config_with(&["10.0.0.1:9000"])).await;
    gateway
        .backend
        .script_stream(vec![Ok(Some(Message::bytes(vec![0u8; 16])))]);

    let res = common::client()
        .get(gateway.url("/api/reports/get"))
        .header("expect-file", "true")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["errorMessage"],
        "Service is not available now, please try later"
    );
}
