use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::api::response::{ApiError, AppJson, JSend};
use crate::library::models::{BookRecord, Highlight, LastRead, ReadingPosition};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct HighlightRequest {
    /// `{page, type, color}` from the PDF viewer, `{cfiRange, type, color}` from EPUB.
    #[serde(default)]
    pub highlight: Option<Value>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProgressRequest {
    /// A page number (PDF) or start CFI (EPUB). Kept loose so that falsy
    /// values are no-ops and unknown books still answer 404.
    #[serde(default)]
    pub position: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HighlightsResponse {
    pub highlights: Vec<Highlight>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub last_read: Option<LastRead>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Append one highlight. Identical highlights are not merged.
pub async fn add_highlight(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<HighlightRequest>,
) -> Result<Json<JSend<HighlightsResponse>>, ApiError> {
    let payload = match req.highlight.filter(|v| !is_falsy(v)) {
        Some(Value::Object(map)) => map,
        Some(_) => {
            find_book(&state, &id)?;
            return Err(ApiError::bad_request("highlight must be a JSON object"));
        }
        None => {
            // Nothing to store; still answer with the current list.
            let book = find_book(&state, &id)?;
            return Ok(JSend::success(HighlightsResponse {
                highlights: book.highlights,
            }));
        }
    };

    let mut highlight = Some(Highlight::new(payload, Utc::now()));
    let book = state
        .library
        .update(&id, &mut |book: &mut BookRecord| {
            if let Some(h) = highlight.take() {
                book.highlights.push(h);
            }
        })?
        .ok_or_else(ApiError::book_not_found)?;

    tracing::debug!(book_id = %id, highlights = book.highlights.len(), "Added highlight");
    Ok(JSend::success(HighlightsResponse {
        highlights: book.highlights,
    }))
}

/// Overwrite the book's last-read marker.
pub async fn save_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<ProgressRequest>,
) -> Result<Json<JSend<ProgressResponse>>, ApiError> {
    let position = match req.position.filter(|v| !is_falsy(v)) {
        Some(value) => match position_from_json(&value) {
            Some(position) => position,
            None => {
                find_book(&state, &id)?;
                return Err(ApiError::bad_request(
                    "position must be a page number or a CFI string",
                ));
            }
        },
        None => {
            let book = find_book(&state, &id)?;
            return Ok(JSend::success(ProgressResponse {
                last_read: book.last_read,
            }));
        }
    };

    let last_read = LastRead {
        position,
        timestamp: Utc::now(),
    };
    let book = state
        .library
        .update(&id, &mut |book: &mut BookRecord| {
            book.last_read = Some(last_read.clone())
        })?
        .ok_or_else(ApiError::book_not_found)?;

    tracing::debug!(book_id = %id, position = ?book.last_read.as_ref().map(|lr| &lr.position), "Saved progress");
    Ok(JSend::success(ProgressResponse {
        last_read: book.last_read,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn find_book(state: &AppState, id: &str) -> Result<BookRecord, ApiError> {
    state.library.find(id)?.ok_or_else(ApiError::book_not_found)
}

/// `null`, `false`, `0` and `""` carry nothing to save.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// A positive whole page number (`2.0` included) or a non-empty CFI.
fn position_from_json(value: &Value) -> Option<ReadingPosition> {
    let position = match value {
        Value::String(cfi) => ReadingPosition::Cfi(cfi.clone()),
        Value::Number(n) => {
            let page = match n.as_u64() {
                Some(page) => page,
                None => {
                    let page = n.as_f64().filter(|p| p.fract() == 0.0 && *p > 0.0)?;
                    page as u64
                }
            };
            ReadingPosition::Page(u32::try_from(page).ok()?)
        }
        _ => return None,
    };
    Some(position).filter(ReadingPosition::is_meaningful)
}
