//! libris - a personal PDF and EPUB library server
//!
//! This crate provides book upload, reading progress and highlight storage with:
//! - A swappable library store (one JSON document, or an embedded redb database)
//! - Uploaded binaries kept in a local object store under generated filenames
//! - A REST API with multipart upload support and JSend responses
//! - Viewer state machines and a retrying reporter client for the reading UI

pub mod api;
pub mod client;
pub mod config;
pub mod library;
pub mod object_store;
pub mod viewer;

use std::sync::Arc;

use config::Config;
use library::LibraryStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub library: Arc<dyn LibraryStore>,
    pub object_store: Arc<dyn object_store::ObjectStore>,
}
