use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // Pages
        .route("/", get(handlers::list_books))
        .route(
            "/upload",
            post(handlers::upload_book).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/book/:id", get(handlers::get_book))
        // Stored binaries
        .route("/uploads/*filename", get(handlers::serve_upload))
        // Reading API
        .route("/api/book/:id", delete(handlers::delete_book))
        .route("/api/book/:id/highlight", post(handlers::add_highlight))
        .route("/api/book/:id/progress", post(handlers::save_progress))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
