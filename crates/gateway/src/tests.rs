//! Router tests against in-memory stores and the mock gateway

use super::*;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use regula_common::cache::MemoryAnswerCache;
use regula_common::config::{CacheBackend, DocumentBackend};
use regula_common::documents::MemoryDocumentStore;
use regula_common::inference::MockGateway;
use regula_common::summary::HEADINGS;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "regula-test-boundary";

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.documents = DocumentBackend::Memory;
    config.storage.answer_cache = CacheBackend::Memory;
    config.inference.provider = "mock".into();
    config.rate_limit.enabled = false;
    config
}

fn app_with(config: AppConfig, gateway: MockGateway) -> Router {
    let services = Services::new(
        &config,
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(MemoryAnswerCache::new(config.inference.qa_model.clone())),
        Arc::new(gateway),
    );
    create_router(AppState {
        config: Arc::new(config),
        services,
    })
}

fn app() -> Router {
    app_with(test_config(), MockGateway::new())
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn upload_text(app: &Router, text: &str) -> String {
    let (status, body) = send(app, multipart_request(&[("inputType", "text"), ("rawText", text)])).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["docId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app(), get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["documents"]["status"], "up");
}

#[tokio::test]
async fn test_upload_then_ask_twice() {
    let app = app();
    let doc_id = upload_text(&app, "Filings are due within 30 days.").await;

    let ask = json!({"docId": doc_id, "question": "What is the deadline?"});
    let (status, first) = send(&app, json_request("/ask", ask.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(first["answer"], "Filings are due within 30 days.");

    let (status, second) = send(&app, json_request("/ask", ask)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert_eq!(second["answer"], first["answer"]);

    let (status, history) = send(&app, get(&format!("/documents/{doc_id}/history"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["docId"], doc_id.as_str());
    assert_eq!(history["entries"].as_array().unwrap().len(), 1);
    assert_eq!(history["entries"][0]["question"], "What is the deadline?");
}

#[tokio::test]
async fn test_ask_rejects_missing_and_malformed_bodies() {
    let app = app();

    let (status, body) = send(&app, json_request("/ask", json!({"question": "What is the deadline?"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing docId");
    assert_eq!(body["code"], "MISSING_FIELD");

    let (status, body) = send(&app, json_request("/ask", json!({"docId": "x", "question": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing question");

    let request = Request::builder()
        .method("POST")
        .uri("/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_ask_unknown_document_is_404() {
    let (status, body) = send(
        &app(),
        json_request("/ask", json!({"docId": "doc1", "question": "What is the deadline?"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "DOCUMENT_NOT_FOUND");
}

#[tokio::test]
async fn test_url_document_has_no_content() {
    let app = app();
    let (status, body) = send(
        &app,
        multipart_request(&[("inputType", "url"), ("url", "https://example.gov/rule")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let doc_id = body["docId"].as_str().unwrap().to_string();

    let (status, body) = send(&app, json_request("/summarize", json!({"docId": doc_id}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NO_CONTENT");
}

#[tokio::test]
async fn test_summarize_returns_text_and_sections() {
    let app = app();
    let doc_id = upload_text(&app, "Filings are due within 30 days.").await;

    let (status, body) = send(&app, json_request("/summarize", json!({"docId": doc_id}))).await;
    assert_eq!(status, StatusCode::OK);

    let summary = body["summary"].as_str().unwrap();
    for heading in HEADINGS {
        assert!(summary.contains(heading), "missing {heading}");
    }
    assert_eq!(body["sections"]["summary"], "Filings are due within 30 days.");
    assert_eq!(body["sections"]["other"], "");
}

#[tokio::test]
async fn test_unstructured_summary_lands_in_other() {
    let app = app_with(test_config(), MockGateway::new().with_answer("Nothing notable in this rule."));
    let doc_id = upload_text(&app, "Filings are due within 30 days.").await;

    let (status, body) = send(&app, json_request("/summarize", json!({"docId": doc_id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "Nothing notable in this rule.");
    assert_eq!(body["sections"]["other"], "Nothing notable in this rule.");
    assert_eq!(body["sections"]["summary"], "");
}

#[tokio::test]
async fn test_inference_failure_is_generic_500() {
    let app = app_with(test_config(), MockGateway::new().failing());
    let doc_id = upload_text(&app, "Filings are due within 30 days.").await;

    let (status, body) = send(
        &app,
        json_request("/ask", json!({"docId": doc_id, "question": "What is the deadline?"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Inference service failed");

    let (status, history) = send(&app, get(&format!("/documents/{doc_id}/history"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(history["entries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_validation() {
    let app = app();

    let (status, body) = send(&app, multipart_request(&[("inputType", "docx")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, multipart_request(&[("rawText", "hello")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing inputType");

    let (status, _) = send(&app, multipart_request(&[("inputType", "pdf")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, json_request("/upload", json!({"inputType": "text"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = send(&app, get("/documents")).await;
    assert!(list["documents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_documents_listed_newest_first() {
    let app = app();
    let first = upload_text(&app, "First rule.").await;
    let second = upload_text(&app, "Second rule, longer.").await;

    let (status, body) = send(&app, get("/documents")).await;
    assert_eq!(status, StatusCode::OK);

    let documents = body["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["id"], second.as_str());
    assert_eq!(documents[1]["id"], first.as_str());
    assert_eq!(documents[1]["textLength"], 11);
    assert_eq!(documents[1]["meta"]["kind"], "text");
    assert!(documents[0]["createdAt"].is_string());
}

#[tokio::test]
async fn test_history_of_unknown_document_is_404() {
    let (status, _) = send(&app(), get("/documents/nope/history")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_applies_to_work_routes_only() {
    let mut config = test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst = 1;
    let app = app_with(config, MockGateway::new());

    let ask = json!({"docId": "doc1", "question": "What is the deadline?"});
    let (status, _) = send(&app, json_request("/ask", ask.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, json_request("/ask", ask)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");

    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_bodies_get_json_413() {
    let mut config = test_config();
    config.server.max_upload_bytes = 64;
    let app = app_with(config, MockGateway::new());

    let long_question = "x".repeat(200);
    let (status, body) = send(
        &app,
        json_request("/ask", json!({"docId": "doc1", "question": long_question})),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
    assert!(body["error"].as_str().unwrap().contains("64 bytes"));

    let long_text = "Filings are due within 30 days. ".repeat(10);
    let (status, body) = send(&app, multipart_request(&[("inputType", "text"), ("rawText", &long_text)])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");

    let (_, list) = send(&app, get("/documents")).await;
    assert!(list["documents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_accepts_any_id_spelling() {
    let app = app();
    let doc_id = upload_text(&app, "Filings are due within 30 days.").await;

    let ask = json!({"docId": doc_id, "question": "What is the deadline?"});
    send(&app, json_request("/ask", ask)).await;

    let upper = doc_id.to_uppercase();
    let (status, body) = send(
        &app,
        json_request("/ask", json!({"docId": upper, "question": "What is the deadline?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], true);

    let simple = doc_id.replace('-', "");
    let (status, history) = send(&app, get(&format!("/documents/{simple}/history"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["docId"], doc_id.as_str());
    assert_eq!(history["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
