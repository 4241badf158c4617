use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::models::BookRecord;
use super::{insert_record, read_modify_write, remove_record, update_record};
use super::{LibraryStore, StoreError};

/// The whole library as one pretty-printed JSON array on disk.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by `path`. The parent directory is created if
    /// needed; the file itself is only written on the first save.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock is still usable.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LibraryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<BookRecord>, StoreError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    fn save(&self, books: &[BookRecord]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(books)?;
        let temp = self.temp_path();
        std::fs::write(&temp, &data)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn insert(&self, book: BookRecord) -> Result<(), StoreError> {
        let _guard = self.lock();
        read_modify_write(self, |books| insert_record(books, book)).map(|_| ())
    }

    fn update(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut BookRecord),
    ) -> Result<Option<BookRecord>, StoreError> {
        let _guard = self.lock();
        read_modify_write(self, |books| Ok(update_record(books, id, apply)))
    }

    fn remove(&self, id: &str) -> Result<Option<BookRecord>, StoreError> {
        let _guard = self.lock();
        read_modify_write(self, |books| Ok(remove_record(books, id)))
    }
}
