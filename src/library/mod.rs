//! Book metadata persistence.
//!
//! Routes talk to an injected [`LibraryStore`]; the default backend keeps the
//! whole collection in one JSON file, and [`RedbStore`] swaps in an embedded
//! database without any route changes.

mod json_store;
pub mod models;
mod redb_store;
mod tables;

pub use json_store::JsonFileStore;
pub use redb_store::RedbStore;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{LibraryBackend, StorageConfig};
use models::BookRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("Duplicate book id: {0}")]
    DuplicateId(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Library file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for StoreError {
    fn from(e: redb::Error) -> Self {
        StoreError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Transaction(Box::new(e))
    }
}

/// Storage abstraction over the book collection.
///
/// Only `load` and `save` are required. The record-level operations default
/// to a whole-collection read-modify-write, which is what the JSON file
/// backend does; backends with real transactions override them.
pub trait LibraryStore: Send + Sync {
    /// All records in library order. A store that has never been written is empty.
    fn load(&self) -> Result<Vec<BookRecord>, StoreError>;

    /// Replace the whole collection.
    fn save(&self, books: &[BookRecord]) -> Result<(), StoreError>;

    fn find(&self, id: &str) -> Result<Option<BookRecord>, StoreError> {
        Ok(self.load()?.into_iter().find(|b| b.id == id))
    }

    /// Append a new record. Fails if the id is already taken.
    fn insert(&self, book: BookRecord) -> Result<(), StoreError> {
        read_modify_write(self, |books| insert_record(books, book)).map(|_| ())
    }

    /// Apply `apply` to the record with this id and persist it.
    /// Returns the updated record, or `None` if there is no such book.
    fn update(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut BookRecord),
    ) -> Result<Option<BookRecord>, StoreError> {
        read_modify_write(self, |books| Ok(update_record(books, id, apply)))
    }

    /// Remove and return the record with this id.
    fn remove(&self, id: &str) -> Result<Option<BookRecord>, StoreError> {
        read_modify_write(self, |books| Ok(remove_record(books, id)))
    }
}

/// Load, let `mutate` edit the collection, and save only if it reports a change.
pub(crate) fn read_modify_write<S, T, F>(store: &S, mutate: F) -> Result<Option<T>, StoreError>
where
    S: LibraryStore + ?Sized,
    F: FnOnce(&mut Vec<BookRecord>) -> Result<Option<T>, StoreError>,
{
    let mut books = store.load()?;
    match mutate(&mut books)? {
        Some(value) => {
            store.save(&books)?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub(crate) fn insert_record(
    books: &mut Vec<BookRecord>,
    book: BookRecord,
) -> Result<Option<()>, StoreError> {
    if books.iter().any(|b| b.id == book.id) {
        return Err(StoreError::DuplicateId(book.id));
    }
    books.push(book);
    Ok(Some(()))
}

pub(crate) fn update_record(
    books: &mut [BookRecord],
    id: &str,
    apply: &mut dyn FnMut(&mut BookRecord),
) -> Option<BookRecord> {
    let book = books.iter_mut().find(|b| b.id == id)?;
    apply(book);
    Some(book.clone())
}

pub(crate) fn remove_record(books: &mut Vec<BookRecord>, id: &str) -> Option<BookRecord> {
    let index = books.iter().position(|b| b.id == id)?;
    Some(books.remove(index))
}

/// Open the backend selected in the storage configuration.
pub fn open(storage: &StorageConfig) -> Result<Arc<dyn LibraryStore>, StoreError> {
    let store: Arc<dyn LibraryStore> = match storage.backend {
        LibraryBackend::Json => Arc::new(JsonFileStore::open(&storage.library_file)?),
        LibraryBackend::Redb => Arc::new(RedbStore::open(&storage.data_dir)?),
    };
    Ok(store)
}
