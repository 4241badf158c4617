//! HTTP client for the library API and the background reporter the viewers
//! use to save progress and highlights.
//!
//! Saves are fire-and-forget from the viewer's point of view: they are queued
//! on a channel and delivered by a spawned task. The task retries transport
//! failures and 5xx answers with exponential backoff, never retries other
//! client errors, and counts every final outcome in [`ReporterStats`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::handlers::{BookResponse, HighlightsResponse, ProgressResponse, ViewerResponse};
use crate::api::response::{JSend, JSendError, JSendFail};
use crate::library::models::{Highlight, LastRead, ReadingPosition};
use crate::viewer::Report;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Book not found: {0}")]
    BookNotFound(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("Server error ({status}): {message}")]
    Server { status: StatusCode, message: String },
}

impl ClientError {
    /// Whether trying the same request again could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => !e.is_decode() && !e.is_builder(),
            ClientError::Server { .. } => true,
            ClientError::BookNotFound(_) | ClientError::Rejected { .. } => false,
        }
    }
}

// ============================================================================
// API client
// ============================================================================

#[derive(Debug, Clone)]
pub struct LibraryClient {
    base_url: String,
    http: reqwest::Client,
}

impl LibraryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_books(&self) -> Result<Vec<BookResponse>, ClientError> {
        let response = self.http.get(self.url("/")).send().await?;
        decode(response, None).await
    }

    pub async fn get_book(&self, id: &str) -> Result<ViewerResponse, ClientError> {
        let response = self.http.get(self.url(&format!("/book/{id}"))).send().await?;
        decode(response, Some(id)).await
    }

    /// Upload a book. The server redirects to the listing, which is returned.
    pub async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        data: Vec<u8>,
        title: Option<&str>,
    ) -> Result<Vec<BookResponse>, ClientError> {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let mut form = reqwest::multipart::Form::new().part("bookFile", part);
        if let Some(title) = title {
            form = form.text("title", title.to_string());
        }

        let response = self
            .http
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;
        decode(response, None).await
    }

    pub async fn delete_book(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/api/book/{id}")))
            .send()
            .await?;
        decode::<Option<Value>>(response, Some(id)).await.map(|_| ())
    }

    pub async fn save_progress(
        &self,
        id: &str,
        position: &ReadingPosition,
    ) -> Result<Option<LastRead>, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/api/book/{id}/progress")))
            .json(&json!({ "position": position }))
            .send()
            .await?;
        let body: ProgressResponse = decode(response, Some(id)).await?;
        Ok(body.last_read)
    }

    pub async fn add_highlight(
        &self,
        id: &str,
        highlight: &Map<String, Value>,
    ) -> Result<Vec<Highlight>, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/api/book/{id}/highlight")))
            .json(&json!({ "highlight": highlight }))
            .send()
            .await?;
        let body: HighlightsResponse = decode(response, Some(id)).await?;
        Ok(body.highlights)
    }

    /// Deliver a single viewer report.
    pub async fn send_report(&self, id: &str, report: &Report) -> Result<(), ClientError> {
        match report {
            Report::Progress(position) => self.save_progress(id, position).await.map(|_| ()),
            Report::Highlight(payload) => self.add_highlight(id, payload).await.map(|_| ()),
        }
    }
}

/// Unwrap a JSend success body, or turn a failure status into a [`ClientError`].
async fn decode<T: DeserializeOwned>(
    response: Response,
    book_id: Option<&str>,
) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        let body: JSend<T> = response.json().await?;
        return Ok(body.data);
    }

    if status == StatusCode::NOT_FOUND {
        if let Some(id) = book_id {
            return Err(ClientError::BookNotFound(id.to_string()));
        }
    }

    let text = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        let message = serde_json::from_str::<JSendError>(&text)
            .map(|e| e.message)
            .unwrap_or(text);
        Err(ClientError::Server { status, message })
    } else {
        let message = serde_json::from_str::<JSendFail>(&text)
            .map(|f| f.data.message)
            .unwrap_or(text);
        Err(ClientError::Rejected { status, message })
    }
}

// ============================================================================
// Background reporter
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries per report, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): doubling, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Default)]
pub struct ReporterStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
}

impl ReporterStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Reports dropped after a permanent error or exhausted retries.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}

/// Per-book delivery task. Reports are sent in the order they were queued.
pub struct Reporter {
    handle: JoinHandle<()>,
    stats: Arc<ReporterStats>,
    tx: mpsc::UnboundedSender<Report>,
}

impl Reporter {
    pub fn spawn(client: LibraryClient, book_id: impl Into<String>, policy: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(ReporterStats::default());
        let handle = tokio::spawn(run(
            client,
            book_id.into(),
            policy,
            rx,
            Arc::clone(&stats),
        ));
        Self { handle, stats, tx }
    }

    /// Queue a report. Never blocks; returns false once the task has stopped.
    pub fn report(&self, report: Report) -> bool {
        self.tx.send(report).is_ok()
    }

    pub fn stats(&self) -> Arc<ReporterStats> {
        Arc::clone(&self.stats)
    }

    /// Deliver everything still queued, then stop.
    pub async fn shutdown(self) -> Arc<ReporterStats> {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Reporter task ended abnormally");
        }
        self.stats
    }
}

async fn run(
    client: LibraryClient,
    book_id: String,
    policy: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<Report>,
    stats: Arc<ReporterStats>,
) {
    while let Some(report) = rx.recv().await {
        match deliver(&client, &book_id, &report, &policy, &stats).await {
            Ok(()) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(book_id = %book_id, report = ?report, error = %e, "Dropping report");
            }
        }
    }
    tracing::debug!(book_id = %book_id, "Reporter drained");
}

/// Send one report, retrying transient failures per `policy`.
pub async fn deliver(
    client: &LibraryClient,
    book_id: &str,
    report: &Report,
    policy: &RetryPolicy,
    stats: &ReporterStats,
) -> Result<(), ClientError> {
    let mut attempt = 1;
    loop {
        match client.send_report(book_id, report).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(book_id = %book_id, attempt, error = %e, ?delay, "Retrying report");
                stats.retries.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
