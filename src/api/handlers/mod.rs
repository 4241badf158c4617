mod books;
mod health;
mod reading;
mod uploads;

pub use books::{
    delete_book, get_book, list_books, upload_book, BookResponse, ListBooksParams, ViewerResponse,
};
pub use health::{health, HealthResponse};
pub use reading::{
    add_highlight, save_progress, HighlightRequest, HighlightsResponse, ProgressRequest,
    ProgressResponse,
};
pub use uploads::serve_upload;
