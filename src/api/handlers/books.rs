use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::Json;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend};
use crate::library::models::{BookFormat, BookRecord, Highlight, LastRead, ReadingPosition};
use crate::object_store::ObjectStoreError;
use crate::AppState;

const UPLOAD_REJECTED: &str = "Only PDF and EPUB files are allowed!";

/// Attempts at claiming an unused stored filename before giving up.
const FILENAME_ATTEMPTS: usize = 5;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub file_url: String,
    pub filename: String,
    pub format: BookFormat,
    pub highlight_count: usize,
    pub id: String,
    pub last_read: Option<LastRead>,
    pub original_name: String,
    pub title: String,
    pub uploaded_at: String,
}

/// Everything a viewer needs to open a book and restore its state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerResponse {
    pub file_url: String,
    pub format: BookFormat,
    pub highlights: Vec<Highlight>,
    pub id: String,
    pub last_read: Option<ReadingPosition>,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ListBooksParams {
    #[serde(default)]
    pub format: Option<BookFormat>,
}

struct UploadedFile {
    content_type: Option<String>,
    data: Bytes,
    file_name: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_books(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListBooksParams>,
) -> Result<Json<JSend<Vec<BookResponse>>>, ApiError> {
    let books = state.library.load()?;
    let items = books
        .iter()
        .filter(|b| params.format.map_or(true, |f| b.format == f))
        .map(book_to_response)
        .collect();

    Ok(JSend::success(items))
}

pub async fn upload_book(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Redirect, ApiError> {
    let mut upload: Option<UploadedFile> = None;
    let mut title: Option<String> = None;

    let max_size = state.config.max_upload_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size, "Invalid multipart data"))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "bookFile" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_size, "Failed to read file"))?;

                if data.len() as u64 > max_size {
                    return Err(too_large(max_size));
                }

                // Browsers submit an empty, nameless part when no file was picked.
                if !file_name.is_empty() {
                    upload = Some(UploadedFile {
                        content_type,
                        data,
                        file_name,
                    });
                }
            }
            "title" => {
                title = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e, max_size, "Invalid title"))?,
                );
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("No file uploaded."))?;

    let format = BookFormat::for_upload(&upload.file_name, upload.content_type.as_deref())
        .ok_or_else(|| {
            tracing::debug!(
                file_name = %upload.file_name,
                content_type = ?upload.content_type,
                "Rejected upload"
            );
            ApiError::bad_request(UPLOAD_REJECTED)
        })?;

    let now = Utc::now();

    // Phase 1: write the binary to the upload directory
    let filename = store_upload(&state, format, now, upload.data).await?;

    // Phase 2: append the metadata record
    let book = BookRecord {
        id: uuid::Uuid::new_v4().to_string(),
        title: title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| upload.file_name.clone()),
        filename: filename.clone(),
        original_name: upload.file_name,
        format,
        uploaded_at: now,
        highlights: Vec::new(),
        last_read: None,
    };
    let book_id = book.id.clone();

    if let Err(e) = state.library.insert(book) {
        // Best-effort cleanup of the stored binary
        if let Err(cleanup) = state.object_store.delete(&filename).await {
            tracing::warn!(filename = %filename, error = %cleanup, "Failed to remove orphaned upload");
        }
        return Err(e.into());
    }

    tracing::info!(book_id = %book_id, filename = %filename, format = format.as_str(), "Uploaded book");

    Ok(Redirect::to("/"))
}

pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<ViewerResponse>>, ApiError> {
    let book = state
        .library
        .find(&id)?
        .ok_or_else(ApiError::book_not_found)?;

    Ok(JSend::success(ViewerResponse {
        file_url: book.file_url(),
        format: book.format,
        id: book.id,
        last_read: book.last_read.map(|lr| lr.position),
        title: book.title,
        highlights: book.highlights,
    }))
}

pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    // Phase 1: drop the record
    let book = state
        .library
        .remove(&id)?
        .ok_or_else(ApiError::book_not_found)?;

    // Phase 2: delete the binary (best-effort)
    if let Err(e) = state.object_store.delete(&book.filename).await {
        tracing::warn!(book_id = %id, filename = %book.filename, error = %e, "Failed to delete book file");
    }

    tracing::info!(book_id = %id, "Deleted book");
    Ok(JSend::success(()))
}

// ============================================================================
// Helpers
// ============================================================================

/// Store the binary as `<unix-millis>-<random 0..1e9>.<ext>`. Keys are
/// write-once, so a taken name is retried with a fresh suffix.
async fn store_upload(
    state: &AppState,
    format: BookFormat,
    now: DateTime<Utc>,
    data: Bytes,
) -> Result<String, ApiError> {
    for _ in 0..FILENAME_ATTEMPTS {
        let suffix = uuid::Uuid::new_v4().as_u128() % 1_000_000_000;
        let candidate = format!(
            "{}-{}.{}",
            now.timestamp_millis(),
            suffix,
            format.extension()
        );
        match state.object_store.put(&candidate, data.clone()).await {
            Ok(()) => return Ok(candidate),
            Err(ObjectStoreError::AlreadyExists(_)) => {
                tracing::debug!(filename = %candidate, "Stored file name taken, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(ApiError::internal("Could not allocate a unique file name"))
}

fn too_large(max_size: u64) -> ApiError {
    ApiError::payload_too_large(format!(
        "File exceeds maximum upload size of {max_size} bytes"
    ))
}

fn multipart_error(e: MultipartError, max_size: u64, context: &str) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max_size)
    } else {
        ApiError::bad_request(format!("{context}: {e}"))
    }
}

fn book_to_response(book: &BookRecord) -> BookResponse {
    BookResponse {
        file_url: book.file_url(),
        filename: book.filename.clone(),
        format: book.format,
        highlight_count: book.highlights.len(),
        id: book.id.clone(),
        last_read: book.last_read.clone(),
        original_name: book.original_name.clone(),
        title: book.title.clone(),
        uploaded_at: book.uploaded_at.to_rfc3339(),
    }
}
