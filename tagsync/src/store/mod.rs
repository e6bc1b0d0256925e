pub mod local;
#[cfg(test)]
pub mod memory;
pub mod remote;

use thiserror::Error;
use time::OffsetDateTime;

use crate::paths::PathError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("api error: {0}")]
    Api(#[from] tagsync_core::VaultError),
    #[error("auth refresh failed: {0}")]
    Auth(#[from] tagsync_core::AuthError),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("timestamp parse error: {0}")]
    Time(#[from] time::error::Parse),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Unsupported(&'static str),
}

/// One entry of a store listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub is_dir: bool,
}

/// Pairing of the stable logical identity (state key, remote path) with the
/// expanded local filesystem path. Built per file per pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedFile {
    pub friendly_path: String,
    pub real_path: String,
}

/// The storage capability the engine is written against. Implemented
/// identically by the local-disk and vault backends; the engine never knows
/// which one it is talking to. Local implementations take real paths, the
/// vault implementation takes friendly paths.
pub trait FileStore {
    fn get_files(&self) -> impl Future<Output = Result<Vec<StoredFile>, StoreError>>;
    fn file_exists(&self, path: &str) -> impl Future<Output = Result<bool, StoreError>>;
    fn get_modified_time(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<OffsetDateTime, StoreError>>;
    fn get_file_contents(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, StoreError>>;
    /// Creates the file and any missing parent directories.
    fn write_file_contents(
        &self,
        path: &str,
        contents: Vec<u8>,
    ) -> impl Future<Output = Result<(), StoreError>>;
    fn delete_file(&self, path: &str) -> impl Future<Output = Result<(), StoreError>>;
    /// Administrative wipe; only the vault backend supports it.
    fn delete_all_files(&self) -> impl Future<Output = Result<(), StoreError>>;
}
