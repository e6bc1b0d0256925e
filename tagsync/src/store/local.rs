use std::io;
use std::path::Path;

use time::OffsetDateTime;

use super::{FileStore, StoreError, StoredFile};

/// Local-disk backend over real (expanded) paths.
pub struct LocalFileStore;

impl FileStore for LocalFileStore {
    async fn get_files(&self) -> Result<Vec<StoredFile>, StoreError> {
        // The engine discovers local files by walking the configured paths;
        // a global listing of the whole disk has no meaning here.
        Err(StoreError::Unsupported(
            "the local file store has no global listing",
        ))
    }

    async fn file_exists(&self, path: &str) -> Result<bool, StoreError> {
        match tokio::fs::metadata(path).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_modified_time(&self, path: &str) -> Result<OffsetDateTime, StoreError> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(OffsetDateTime::from(meta.modified()?))
    }

    async fn get_file_contents(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn write_file_contents(&self, path: &str, contents: Vec<u8>) -> Result<(), StoreError> {
        if let Some(parent) = Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), StoreError> {
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    async fn delete_all_files(&self) -> Result<(), StoreError> {
        Err(StoreError::Unsupported(
            "refusing to delete all local files",
        ))
    }
}
