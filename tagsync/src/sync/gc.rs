use std::collections::HashSet;

use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use crate::config::{GLOBAL_CONFIG_PATH, GlobalConfig, REMOTE_STATE_PATH};
use crate::paths::paths_overlap;
use crate::state::{RemoteFileState, RemoteStateData, StateError};
use crate::store::{FileStore, StoreError, StoredFile};

/// How long an unreferenced remote file is kept before it is deleted.
/// Protects against transient misconfiguration and half-finished config
/// edits propagating between machines.
pub const GRACE_PERIOD: Duration = Duration::days(30);

#[derive(Debug, Error)]
pub enum GcError {
    #[error("remote state error: {0}")]
    State(#[from] StateError),
    #[error("failed to delete remote file `{path}`: {source}")]
    Delete { path: String, source: StoreError },
}

/// Reconciles the orphan record set against the pass listing and the global
/// config, deletes orphans past the grace period, and persists the record
/// set back to the vault unconditionally.
///
/// Lifecycle per remote path: referenced (no record) -> orphaned-pending
/// (record younger than the grace period) -> deleted. A path that becomes
/// referenced again drops straight back to referenced, timer discarded.
pub async fn cleanup_remote_files<S: FileStore>(
    remote: &S,
    remote_files: &[StoredFile],
    global: &GlobalConfig,
    now: OffsetDateTime,
) -> Result<RemoteStateData, GcError> {
    let mut state = RemoteStateData::load(remote).await?;

    let mut listed: HashSet<&str> = HashSet::new();
    for file in remote_files.iter().filter(|file| !file.is_dir) {
        listed.insert(file.path.as_str());
        if is_referenced(&file.path, global) {
            if state.files.remove(&file.path).is_some() {
                debug!(path = %file.path, "remote file is referenced again");
            }
        } else if !state.files.contains_key(&file.path) {
            debug!(path = %file.path, "remote file is no longer referenced");
            state
                .files
                .insert(file.path.clone(), RemoteFileState { mark_deleted: now });
        }
    }

    // Records for files that already vanished from the vault have nothing
    // left to delete.
    let stale: Vec<String> = state
        .files
        .keys()
        .filter(|path| !listed.contains(path.as_str()))
        .cloned()
        .collect();
    for path in stale {
        state.files.remove(&path);
    }

    let expired: Vec<String> = state
        .files
        .iter()
        .filter(|(_, record)| now - record.mark_deleted > GRACE_PERIOD)
        .map(|(path, _)| path.clone())
        .collect();
    for path in expired {
        remote
            .delete_file(&path)
            .await
            .map_err(|source| GcError::Delete {
                path: path.clone(),
                source,
            })?;
        info!(path = %path, "deleted remote file past its grace period");
        state.files.remove(&path);
    }

    state.save(remote).await?;
    Ok(state)
}

fn is_referenced(path: &str, global: &GlobalConfig) -> bool {
    if path == GLOBAL_CONFIG_PATH || path == REMOTE_STATE_PATH {
        return true;
    }
    global
        .tag_paths
        .values()
        .flatten()
        .any(|configured| paths_overlap(path, configured))
}
