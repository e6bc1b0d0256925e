use std::collections::BTreeMap;
use std::sync::Mutex;

use time::OffsetDateTime;

use super::{FileStore, StoreError, StoredFile};

#[derive(Debug, Clone)]
struct MemoryEntry {
    contents: Vec<u8>,
    modified: OffsetDateTime,
    is_dir: bool,
}

/// In-memory store double for engine and GC tests, with settable
/// modification times.
#[derive(Default)]
pub struct MemoryFileStore {
    entries: Mutex<BTreeMap<String, MemoryEntry>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_file(&self, path: &str, contents: &[u8], modified: OffsetDateTime) {
        self.entries.lock().unwrap().insert(
            path.to_string(),
            MemoryEntry {
                contents: contents.to_vec(),
                modified,
                is_dir: false,
            },
        );
    }

    pub fn insert_dir(&self, path: &str) {
        self.entries.lock().unwrap().insert(
            path.to_string(),
            MemoryEntry {
                contents: Vec::new(),
                modified: OffsetDateTime::UNIX_EPOCH,
                is_dir: true,
            },
        );
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(path)
            .map(|entry| entry.contents.clone())
    }

    pub fn set_modified(&self, path: &str, modified: OffsetDateTime) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(path) {
            entry.modified = modified;
        }
    }

    pub fn remove(&self, path: &str) {
        self.entries.lock().unwrap().remove(path);
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

impl FileStore for MemoryFileStore {
    async fn get_files(&self) -> Result<Vec<StoredFile>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(path, entry)| StoredFile {
                path: path.clone(),
                is_dir: entry.is_dir,
            })
            .collect())
    }

    async fn file_exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().unwrap().contains_key(path))
    }

    async fn get_modified_time(&self, path: &str) -> Result<OffsetDateTime, StoreError> {
        self.entries
            .lock()
            .unwrap()
            .get(path)
            .map(|entry| entry.modified)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn get_file_contents(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.contents(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write_file_contents(&self, path: &str, contents: Vec<u8>) -> Result<(), StoreError> {
        self.entries.lock().unwrap().insert(
            path.to_string(),
            MemoryEntry {
                contents,
                modified: OffsetDateTime::now_utc(),
                is_dir: false,
            },
        );
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn delete_all_files(&self) -> Result<(), StoreError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}
