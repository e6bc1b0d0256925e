use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::datetime;

use crate::config::REMOTE_STATE_PATH;
use crate::store::{FileStore, StoreError};

/// Sentinel marking a file that has never been uploaded or downloaded.
/// Records are created eagerly on first sight of a path, so "never synced"
/// is a timestamp comparison, never an absence check.
pub fn never_synced() -> OffsetDateTime {
    datetime!(2000-01-01 01:01:01 UTC)
}

pub fn has_been_synced(last_cloud_update: OffsetDateTime) -> bool {
    last_cloud_update > never_synced()
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid state file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFileState {
    /// Last time this file was uploaded to or downloaded from the vault.
    #[serde(with = "time::serde::rfc3339")]
    pub last_cloud_update: OffsetDateTime,
    /// Set when a previously-synced file disappears locally; suppresses
    /// re-download until the file reappears.
    #[serde(default)]
    pub deleted_local: bool,
}

impl LocalFileState {
    pub fn new() -> Self {
        Self {
            last_cloud_update: never_synced(),
            deleted_local: false,
        }
    }
}

impl Default for LocalFileState {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-friendly-path sync history, persisted locally once per run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LocalStateData {
    #[serde(default)]
    pub files: HashMap<String, LocalFileState>,
}

impl LocalStateData {
    pub fn load_from(path: &Path) -> Result<Self, StateError> {
        match fs::read(path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Returns the record for a path, creating it with the never-synced
    /// sentinel on first sight.
    pub fn ensure(&mut self, friendly_path: &str) -> &mut LocalFileState {
        self.files
            .entry(friendly_path.to_string())
            .or_insert_with(LocalFileState::new)
    }

    pub fn get(&self, friendly_path: &str) -> Option<&LocalFileState> {
        self.files.get(friendly_path)
    }

    pub fn insert(&mut self, friendly_path: &str, record: LocalFileState) {
        self.files.insert(friendly_path.to_string(), record);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileState {
    /// When this remote path was first observed with no covering tag path.
    #[serde(with = "time::serde::rfc3339")]
    pub mark_deleted: OffsetDateTime,
}

/// Orphan bookkeeping for remote garbage collection, persisted in the vault
/// so every machine sees the same grace-period clocks.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemoteStateData {
    #[serde(default)]
    pub files: HashMap<String, RemoteFileState>,
}

impl RemoteStateData {
    /// Loads the record set from the vault; a vault without one yet is an
    /// empty set.
    pub async fn load<S: FileStore>(store: &S) -> Result<Self, StateError> {
        if !store.file_exists(REMOTE_STATE_PATH).await? {
            return Ok(Self::default());
        }
        let contents = store.get_file_contents(REMOTE_STATE_PATH).await?;
        Ok(serde_json::from_slice(&contents)?)
    }

    pub async fn save<S: FileStore>(&self, store: &S) -> Result<(), StateError> {
        let contents = serde_json::to_vec_pretty(self)?;
        store.write_file_contents(REMOTE_STATE_PATH, contents).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryFileStore;
    use tempfile::tempdir;

    #[test]
    fn sentinel_is_not_synced_and_later_times_are() {
        assert!(!has_been_synced(never_synced()));
        assert!(has_been_synced(datetime!(2021-10-01 09:00:00 UTC)));
    }

    #[test]
    fn missing_local_state_is_empty() {
        let dir = tempdir().unwrap();
        let state = LocalStateData::load_from(&dir.path().join("state.json")).unwrap();
        assert!(state.files.is_empty());
    }

    #[test]
    fn local_state_round_trips_sentinel_and_flags() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = LocalStateData::default();
        state.ensure("~/a");
        state.ensure("~/b").deleted_local = true;
        state.ensure("~/b").last_cloud_update = datetime!(2021-10-01 09:00:00 UTC);
        state.save_to(&path).unwrap();

        let loaded = LocalStateData::load_from(&path).unwrap();
        assert_eq!(
            loaded.get("~/a").unwrap().last_cloud_update,
            never_synced()
        );
        assert!(!loaded.get("~/a").unwrap().deleted_local);
        assert!(loaded.get("~/b").unwrap().deleted_local);
    }

    #[test]
    fn tolerates_records_without_the_deleted_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"files":{"~/a":{"lastCloudUpdate":"2021-10-01T09:00:00Z"}}}"#,
        )
        .unwrap();

        let state = LocalStateData::load_from(&path).unwrap();
        assert!(!state.get("~/a").unwrap().deleted_local);
        assert!(has_been_synced(state.get("~/a").unwrap().last_cloud_update));
    }

    #[tokio::test]
    async fn remote_state_defaults_to_empty_and_round_trips() {
        let store = MemoryFileStore::new();
        let state = RemoteStateData::load(&store).await.unwrap();
        assert!(state.files.is_empty());

        let mut state = RemoteStateData::default();
        state.files.insert(
            "~/old.txt".to_string(),
            RemoteFileState {
                mark_deleted: datetime!(2021-10-01 09:00:00 UTC),
            },
        );
        state.save(&store).await.unwrap();

        let loaded = RemoteStateData::load(&store).await.unwrap();
        assert_eq!(loaded.files["~/old.txt"].mark_deleted.hour(), 9);
    }
}
