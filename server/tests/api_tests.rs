use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use docsearch_core::error::ExtractError;
use docsearch_core::extract::{Extraction, TextExtractor};
use docsearch_core::{DocumentStore, ExtractionMethod, Gateway, GatewayConfig, MemoryStore, SledStore};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

const BOUNDARY: &str = "docsearch-test-boundary";

fn app() -> Router {
    app_with(Arc::new(MemoryStore::new()))
}

fn app_with(store: Arc<dyn DocumentStore>) -> Router {
    let extractor: Arc<dyn TextExtractor> = Arc::new(|bytes: &[u8]| -> Result<Extraction, ExtractError> {
        Ok(Extraction { text: String::from_utf8_lossy(bytes).into_owned(), method: ExtractionMethod::DirectText })
    });
    let gateway = Gateway::new(store, extractor, GatewayConfig::default());
    docsearch_server::build_app(Arc::new(gateway))
}

async fn send(app: &Router, method: Method, uri: &str, user: Option<&str>, body: Body, content_type: Option<String>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        req = req.header("X-User-Id", user);
    }
    if let Some(ct) = content_type {
        req = req.header("content-type", ct);
    }
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str, user: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, Some(user), Body::empty(), None).await
}

async fn upload(app: &Router, user: &str, file_name: &str, content: &str) -> (StatusCode, Value) {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/pdf\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
    );
    send(
        app,
        Method::POST,
        "/documents",
        Some(user),
        Body::from(body),
        Some(format!("multipart/form-data; boundary={BOUNDARY}")),
    )
    .await
}

#[tokio::test]
async fn health_needs_no_identity() {
    let app = app();
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/search?q=x", None, Body::empty(), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = get(&app, "/statistics", "bad id with spaces").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_then_search_across_scopes() {
    let app = app();
    let (status, a) = upload(&app, "u1", "report.pdf", "quarterly report Q3").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(a["extraction_method"], "direct-text");
    let (status, _) = upload(&app, "u2", "results.pdf", "Q3 results summary").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, global) = get(&app, "/search?q=q3&scope=global&page=1&page_size=10", "u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(global["pagination"]["total_matches"], 2);
    assert_eq!(global["pagination"]["total_pages"], 1);
    assert_eq!(global["query"]["match_count"], 2);
    assert_eq!(global["query"]["scope"], "global");
    let owners: Vec<&str> = global["hits"].as_array().unwrap().iter().map(|h| h["owner"].as_str().unwrap()).collect();
    assert!(owners.contains(&"u1") && owners.contains(&"u2"));

    let (_, personal) = get(&app, "/search?q=Q3&scope=personal", "u1").await;
    let hits = personal["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], a["id"]);
    assert!(hits[0].get("owner").is_none());
}

#[tokio::test]
async fn highlight_wraps_matches() {
    let app = app();
    upload(&app, "u1", "rust.pdf", "Learning rust and more Rust").await;
    let (_, body) = get(&app, "/search?q=rust&highlight=true", "u1").await;
    assert_eq!(body["hits"][0]["highlighted"], "Learning <em>rust</em> and more <em>Rust</em>");
    assert_eq!(body["hits"][0]["snippet"]["match_offsets"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn blank_search_term_is_rejected() {
    let app = app();
    let (status, body) = get(&app, "/search?q=%20%20", "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn non_pdf_upload_is_rejected() {
    let app = app();
    let (status, body) = upload(&app, "u1", "notes.txt", "some words in a text file").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("PDF"));
}

#[tokio::test]
async fn short_extraction_is_unprocessable() {
    let app = app();
    let (status, body) = upload(&app, "u1", "blank.pdf", "   ").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "PROCESSING_ERROR");
}

#[tokio::test]
async fn fetch_and_delete_follow_ownership() {
    let app = app();
    let (_, doc) = upload(&app, "u1", "a.pdf", "quarterly report Q3").await;
    let id = doc["id"].as_u64().unwrap();

    let (status, _) = get(&app, &format!("/documents/{id}"), "u2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = get(&app, &format!("/documents/{id}?scope=global"), "u2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["extracted_text"], "quarterly report Q3");

    let uri = format!("/documents/{id}");
    let (status, body) = send(&app, Method::DELETE, &uri, Some("u2"), Body::empty(), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = send(&app, Method::DELETE, &uri, Some("u1"), Body::empty(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert_eq!(body["file_name"], "a.pdf");

    let (status, _) = send(&app, Method::DELETE, &uri, Some("u1"), Body::empty(), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, &uri, "u1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, search) = get(&app, "/search?q=Q3&scope=global", "u1").await;
    assert_eq!(search["pagination"]["total_matches"], 0);
}

#[tokio::test]
async fn listing_and_statistics_are_personal() {
    let app = app();
    upload(&app, "u1", "one.pdf", "first document body").await;
    upload(&app, "u1", "two.pdf", "second document body").await;
    upload(&app, "u2", "three.pdf", "someone else's document").await;

    let (status, list) = get(&app, "/documents?page_size=1&ordering=file_name", "u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["pagination"]["total_matches"], 2);
    assert_eq!(list["pagination"]["total_pages"], 2);
    assert_eq!(list["items"][0]["file_name"], "one.pdf");

    let (status, _) = get(&app, "/documents?ordering=sideways", "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, stats) = get(&app, "/statistics", "u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["user"], "u1");
    assert_eq!(stats["total_documents"], 2);
    assert_eq!(stats["recent_count"], 2);
    assert_eq!(stats["method_distribution"][0]["method"], "direct-text");
    assert_eq!(stats["method_distribution"][0]["count"], 2);
}

#[tokio::test]
async fn malformed_query_params_get_a_json_error() {
    let app = app();
    let (status, body) = get(&app, "/search?q=x&page=abc", "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("invalid digit"));

    let (status, body) = get(&app, "/search?q=x&scope=everyone", "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = get(&app, "/documents?page_size=-1", "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn malformed_document_id_gets_a_json_error() {
    let app = app();
    let (status, body) = get(&app, "/documents/not-a-number", "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn sled_store_serves_requests_after_a_delete() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SledStore::open(dir.path().join("db")).unwrap());
    let app = app_with(store);

    let (_, a) = upload(&app, "u1", "a.pdf", "quarterly report Q3 alpha").await;
    upload(&app, "u2", "b.pdf", "quarterly report Q3 beta").await;

    let uri = format!("/documents/{}", a["id"]);
    let (status, _) = send(&app, Method::DELETE, &uri, Some("u1"), Body::empty(), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&app, "/search?q=q3&scope=global", "u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total_matches"], 1);
    assert_eq!(body["hits"][0]["file_name"], "b.pdf");

    let (status, stats) = get(&app, "/statistics", "u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_documents"], 0);

    let (status, body) = send(&app, Method::DELETE, &uri, Some("u1"), Body::empty(), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}
