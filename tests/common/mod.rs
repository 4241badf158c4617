//! Shared helpers for libris integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use libris::config::{Config, LibraryBackend, ServerConfig, StorageConfig};
use libris::object_store::LocalStore;
use libris::{api, library, AppState};

pub const BOUNDARY: &str = "libris-test-boundary";

/// Small enough to exercise the size limit cheaply.
pub const MAX_UPLOAD_SIZE: u64 = 1024 * 1024;

/// Create a test AppState with scratch library storage and upload directory.
pub fn test_state(temp_dir: &tempfile::TempDir, backend: LibraryBackend) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");

    let config = Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
        },
        storage: StorageConfig {
            backend,
            library_file: data_dir.join("library.json"),
            data_dir,
            upload_dir: temp_dir.path().join("uploads"),
        },
        max_upload_size: MAX_UPLOAD_SIZE,
    };

    let library = library::open(&config.storage).expect("Failed to open test library");
    let object_store =
        LocalStore::new(&config.storage.upload_dir).expect("Failed to create test upload dir");

    Arc::new(AppState {
        config,
        library,
        object_store: Arc::new(object_store),
    })
}

pub fn test_app(temp_dir: &tempfile::TempDir, backend: LibraryBackend) -> (Arc<AppState>, Router) {
    let state = test_state(temp_dir, backend);
    let app = api::create_router(Arc::clone(&state));
    (state, app)
}

/// One part of a hand-built multipart/form-data body.
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{file_name}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn upload_request(
    file_name: &str,
    content_type: &str,
    data: &[u8],
    title: Option<&str>,
) -> Request<Body> {
    let mut parts = vec![Part {
        name: "bookFile",
        file_name: Some(file_name),
        content_type: Some(content_type),
        data,
    }];
    if let Some(title) = title {
        parts.push(Part {
            name: "title",
            file_name: None,
            content_type: None,
            data: title.as_bytes(),
        });
    }
    multipart_request(&parts)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Send a request and decode the JSON body (Null for an empty body).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

/// Upload a PDF and return the new book's id.
pub async fn upload_pdf(app: &Router, title: &str) -> String {
    let (status, _) = send(
        app,
        upload_request("book.pdf", "application/pdf", b"%PDF-1.7 test", Some(title)),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    last_book_id(app).await
}

/// Upload an EPUB and return the new book's id.
pub async fn upload_epub(app: &Router, title: &str) -> String {
    let (status, _) = send(
        app,
        upload_request(
            "book.epub",
            "application/epub+zip",
            b"PK\x03\x04 epub",
            Some(title),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    last_book_id(app).await
}

pub async fn list(app: &Router) -> Vec<Value> {
    let (status, body) = send(app, empty_request("GET", "/")).await;
    assert_eq!(status, StatusCode::OK);
    body["data"].as_array().cloned().unwrap_or_default()
}

async fn last_book_id(app: &Router) -> String {
    let books = list(app).await;
    books
        .last()
        .and_then(|b| b["id"].as_str())
        .expect("library should contain the uploaded book")
        .to_string()
}
