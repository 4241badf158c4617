use redb::{Database, ReadableTable};
use std::path::Path;
use std::sync::Arc;

use super::models::BookRecord;
use super::tables::BOOKS;
use super::{LibraryStore, StoreError};

/// Embedded-database backend: one msgpack-encoded record per book id.
///
/// Record operations run in a single redb transaction each, so concurrent
/// writers are serialised by the database rather than by a process lock.
pub struct RedbStore {
    db: Arc<Database>,
}

impl Clone for RedbStore {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl RedbStore {
    /// Open or create `library.redb` inside `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("library.redb");
        let db = Arc::new(Database::create(db_path)?);

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BOOKS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl LibraryStore for RedbStore {
    fn load(&self) -> Result<Vec<BookRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BOOKS)?;

        let mut books = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let book: BookRecord = rmp_serde::from_slice(value.value())?;
            books.push(book);
        }

        // Keys are UUIDs, so restore upload order.
        books.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(books)
    }

    fn save(&self, books: &[BookRecord]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BOOKS)?;
            let keys: Vec<String> = table
                .iter()?
                .map(|r| r.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in keys {
                table.remove(key.as_str())?;
            }
            for book in books {
                let data = rmp_serde::to_vec_named(book)?;
                table.insert(book.id.as_str(), data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find(&self, id: &str) -> Result<Option<BookRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BOOKS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    fn insert(&self, book: BookRecord) -> Result<(), StoreError> {
        debug_assert!(!book.id.is_empty(), "book id must not be empty");

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BOOKS)?;
            if table.get(book.id.as_str())?.is_some() {
                return Err(StoreError::DuplicateId(book.id));
            }
            let data = rmp_serde::to_vec_named(&book)?;
            table.insert(book.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn update(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut BookRecord),
    ) -> Result<Option<BookRecord>, StoreError> {
        let write_txn = self.db.begin_write()?;

        let existing: Option<BookRecord> = {
            let table = write_txn.open_table(BOOKS)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        let updated = match existing {
            Some(mut book) => {
                apply(&mut book);
                let data = rmp_serde::to_vec_named(&book)?;
                let mut table = write_txn.open_table(BOOKS)?;
                table.insert(id, data.as_slice())?;
                Some(book)
            }
            None => None,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    fn remove(&self, id: &str) -> Result<Option<BookRecord>, StoreError> {
        let write_txn = self.db.begin_write()?;
        let removed: Option<BookRecord> = {
            let mut table = write_txn.open_table(BOOKS)?;
            let result = match table.remove(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };
        write_txn.commit()?;
        Ok(removed)
    }
}
