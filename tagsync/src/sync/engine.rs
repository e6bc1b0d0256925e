use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::decision::{FileFacts, SyncAction, decide};
use super::gc::{GcError, cleanup_remote_files};
use crate::cipher::{CipherError, ContentCipher};
use crate::config::{GLOBAL_CONFIG_PATH, GlobalConfig, LocalConfig};
use crate::paths::{self, PathError, path_has_prefix};
use crate::state::{LocalStateData, StateError};
use crate::store::{FileStore, StoreError, StoredFile, SyncedFile};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
    #[error(transparent)]
    Gc(#[from] GcError),
}

/// What happened to one file during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Downloaded,
    Uploaded,
    MarkedDeleted,
    Unchanged,
    Skipped,
}

/// Counters for one pass, for operator-facing logging and for tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub downloaded: usize,
    pub uploaded: usize,
    pub marked_deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
    /// True when the global config file itself was freshly pulled; the
    /// caller runs exactly one more pass with the new configuration.
    pub config_downloaded: bool,
}

impl PassSummary {
    fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Downloaded => self.downloaded += 1,
            SyncOutcome::Uploaded => self.uploaded += 1,
            SyncOutcome::MarkedDeleted => self.marked_deleted += 1,
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// The reconciliation engine. Owns the local sync state for the duration of
/// a run and drives both stores and the cipher strictly sequentially; it
/// never knows which concrete backends it is talking to.
pub struct Syncer<L, R, C> {
    local: L,
    remote: R,
    cipher: C,
    state: LocalStateData,
    force_download: bool,
    config_path: String,
}

impl<L, R, C> Syncer<L, R, C>
where
    L: FileStore,
    R: FileStore,
    C: ContentCipher,
{
    pub fn new(
        local: L,
        remote: R,
        cipher: C,
        state: LocalStateData,
        force_download: bool,
    ) -> Self {
        Self {
            local,
            remote,
            cipher,
            state,
            force_download,
            config_path: GLOBAL_CONFIG_PATH.to_string(),
        }
    }

    pub fn with_config_path(mut self, config_path: impl Into<String>) -> Self {
        self.config_path = config_path.into();
        self
    }

    pub fn state(&self) -> &LocalStateData {
        &self.state
    }

    pub fn into_state(self) -> LocalStateData {
        self.state
    }

    /// One full pass: fetch the remote listing once, reconcile every
    /// in-scope path, reconcile the global config file, then garbage-collect
    /// the vault. Per-path and per-file failures are logged and absorbed;
    /// listing and GC failures end the run.
    pub async fn run_pass(
        &mut self,
        global: &GlobalConfig,
        local_config: &LocalConfig,
    ) -> Result<PassSummary, EngineError> {
        let remote_files = self.remote.get_files().await?;
        let remote_by_path: HashMap<&str, &StoredFile> = remote_files
            .iter()
            .map(|file| (file.path.as_str(), file))
            .collect();

        let mut summary = PassSummary::default();
        for (tag, paths_for_tag) in &global.tag_paths {
            if !local_config.tags.contains(tag) {
                continue;
            }
            for path_to_sync in paths_for_tag {
                if let Err(err) = self
                    .sync_path(path_to_sync, &remote_by_path, &mut summary)
                    .await
                {
                    warn!(path = %path_to_sync, error = %err, "skipping configured path");
                    summary.errors += 1;
                }
            }
        }

        // The global config governs every machine's path set, so it is
        // reconciled even though no tag lists it.
        let config_path = self.config_path.clone();
        match self.handle_file(&config_path, &remote_by_path).await {
            Ok(outcome) => {
                summary.record(outcome);
                if outcome == SyncOutcome::Downloaded {
                    summary.config_downloaded = true;
                }
            }
            Err(err) => {
                warn!(path = %config_path, error = %err, "failed to sync global config");
                summary.errors += 1;
            }
        }

        cleanup_remote_files(&self.remote, &remote_files, global, OffsetDateTime::now_utc())
            .await?;

        info!(
            downloaded = summary.downloaded,
            uploaded = summary.uploaded,
            marked_deleted = summary.marked_deleted,
            errors = summary.errors,
            "sync pass finished"
        );
        Ok(summary)
    }

    /// Reconciles one configured path: walk the local tree, cross off every
    /// walked file from the provisional remote set, then reconcile whatever
    /// the walk never visited (deletions, downloads into an absent tree).
    async fn sync_path(
        &mut self,
        path_to_sync: &str,
        remote_by_path: &HashMap<&str, &StoredFile>,
        summary: &mut PassSummary,
    ) -> Result<(), EngineError> {
        let expanded = paths::expand(path_to_sync)?;
        // Walk through the symlink target; a path that does not exist
        // locally yet is fine, it may live only in the vault.
        let resolved = std::fs::canonicalize(&expanded).unwrap_or(expanded);
        let resolved_root = resolved.to_string_lossy().into_owned();

        let mut pending_remote: BTreeSet<String> = remote_by_path
            .values()
            .filter(|file| !file.is_dir && path_has_prefix(&file.path, path_to_sync))
            .map(|file| file.path.clone())
            .collect();

        if resolved.exists() {
            for entry in WalkDir::new(&resolved) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!(path = %path_to_sync, error = %err, "cannot walk directory entry");
                        summary.errors += 1;
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let real = entry.path().to_string_lossy();
                let friendly = real.replacen(&resolved_root, path_to_sync, 1);
                pending_remote.remove(&friendly);
                self.handle_one(&friendly, remote_by_path, summary).await;
            }
        }

        for friendly in pending_remote {
            self.handle_one(&friendly, remote_by_path, summary).await;
        }
        Ok(())
    }

    async fn handle_one(
        &mut self,
        friendly: &str,
        remote_by_path: &HashMap<&str, &StoredFile>,
        summary: &mut PassSummary,
    ) {
        match self.handle_file(friendly, remote_by_path).await {
            Ok(outcome) => summary.record(outcome),
            Err(err) => {
                warn!(path = %friendly, error = %err, "failed to sync file");
                summary.errors += 1;
            }
        }
    }

    /// Applies the per-file decision to one friendly path and stamps the
    /// state record. Leaves the record's timestamp untouched on failure so
    /// the file is retried next pass.
    async fn handle_file(
        &mut self,
        friendly: &str,
        remote_by_path: &HashMap<&str, &StoredFile>,
    ) -> Result<SyncOutcome, EngineError> {
        debug!(path = %friendly, "reconciling");
        let file = SyncedFile {
            friendly_path: friendly.to_string(),
            real_path: paths::expand(friendly)?.to_string_lossy().into_owned(),
        };

        let mut record = self.state.ensure(friendly).clone();
        let exists_locally = self.local.file_exists(&file.real_path).await?;
        if exists_locally && record.deleted_local {
            // The file came back; resume normal reconciliation.
            record.deleted_local = false;
            self.state.insert(friendly, record.clone());
        }
        if record.deleted_local {
            debug!(path = %friendly, "skipping file deleted locally");
            return Ok(SyncOutcome::Skipped);
        }

        let remote_entry = remote_by_path.get(friendly).copied();
        let exists_remotely = remote_entry.is_some();
        let remote_is_dir = remote_entry.is_some_and(|entry| entry.is_dir);
        if !exists_locally && !exists_remotely {
            // Nothing anywhere: not an error, and the record stays untouched.
            return Ok(SyncOutcome::Skipped);
        }

        let modified_local = if exists_locally {
            Some(self.local.get_modified_time(&file.real_path).await?)
        } else {
            None
        };
        let modified_remote = if exists_remotely && !remote_is_dir {
            Some(self.remote.get_modified_time(&file.friendly_path).await?)
        } else {
            None
        };

        let facts = FileFacts {
            exists_locally,
            exists_remotely,
            remote_is_dir,
            force_download: self.force_download,
            modified_local,
            modified_remote,
            last_cloud_update: record.last_cloud_update,
        };

        let outcome = match decide(&facts) {
            SyncAction::Download => {
                let payload = self.remote.get_file_contents(&file.friendly_path).await?;
                let plaintext = self.cipher.decrypt(&payload)?;
                self.local
                    .write_file_contents(&file.real_path, plaintext)
                    .await?;
                info!(path = %friendly, "downloaded file");
                SyncOutcome::Downloaded
            }
            SyncAction::Upload => {
                let plaintext = self.local.get_file_contents(&file.real_path).await?;
                let payload = self.cipher.encrypt(&plaintext)?;
                self.remote
                    .write_file_contents(&file.friendly_path, payload)
                    .await?;
                info!(path = %friendly, "uploaded file");
                SyncOutcome::Uploaded
            }
            SyncAction::MarkDeleted => {
                info!(path = %friendly, "marking file deleted locally");
                record.deleted_local = true;
                SyncOutcome::MarkedDeleted
            }
            SyncAction::Nothing => SyncOutcome::Unchanged,
        };

        record.last_cloud_update = OffsetDateTime::now_utc();
        self.state.insert(friendly, record);
        Ok(outcome)
    }
}
