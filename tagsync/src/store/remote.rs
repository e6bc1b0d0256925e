use std::collections::HashMap;
use std::path::PathBuf;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use tagsync_core::{AuthClient, ResourceType, VaultClient, VaultError};

use super::{FileStore, StoreError, StoredFile};
use crate::config::Session;

/// Vault backend over friendly paths. Wraps every API call in a
/// refresh-once-and-retry guard for expired credentials and materializes
/// remote parent folders lazily, memoizing folder ids for the pass so
/// repeated uploads under one tree issue no repeated folder calls.
pub struct VaultFileStore {
    client: RwLock<VaultClient>,
    auth: AuthClient,
    session: Mutex<Session>,
    session_path: PathBuf,
    folders: Mutex<HashMap<String, String>>,
}

impl VaultFileStore {
    pub fn new(session: Session, session_path: PathBuf) -> Result<Self, StoreError> {
        let client = VaultClient::new(&session.server_url, session.access_token.clone())?;
        let auth = AuthClient::new(&session.server_url)?;
        Ok(Self {
            client: RwLock::new(client),
            auth,
            session: Mutex::new(session),
            session_path,
            folders: Mutex::new(HashMap::new()),
        })
    }

    async fn current_client(&self) -> VaultClient {
        self.client.read().await.clone()
    }

    /// Runs one API call; on an auth-classified failure, refreshes the
    /// session once, persists it, and retries once. Everything else is
    /// surfaced as-is; the reconciliation engine never sees credentials.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(VaultClient) -> Fut,
        Fut: Future<Output = Result<T, VaultError>>,
    {
        match op(self.current_client().await).await {
            Err(err) if err.is_auth() => {
                debug!(error = %err, "vault credential rejected; refreshing session");
                self.reauthenticate().await?;
                Ok(op(self.current_client().await).await?)
            }
            result => Ok(result?),
        }
    }

    async fn reauthenticate(&self) -> Result<(), StoreError> {
        let mut session = self.session.lock().await;
        let token = self.auth.refresh_session(&session.refresh_token).await?;
        session.access_token = token.access_token;
        if let Some(refresh_token) = token.refresh_token {
            session.refresh_token = refresh_token;
        }
        if let Err(err) = session.save_to(&self.session_path) {
            warn!(error = %err, "could not persist refreshed vault session");
        }
        let mut client = self.client.write().await;
        *client = client.with_token(session.access_token.clone());
        info!("vault session refreshed");
        Ok(())
    }

    async fn ensure_parent_folders(&self, path: &str) -> Result<(), StoreError> {
        let mut missing = Vec::new();
        let mut cursor = parent_path(path);
        while let Some(dir) = cursor {
            if self.folders.lock().await.contains_key(&dir) {
                break;
            }
            cursor = parent_path(&dir);
            missing.push(dir);
        }
        // Parent-first: the deepest missing ancestor was pushed last.
        for dir in missing.into_iter().rev() {
            let folder = self
                .run(|client| {
                    let dir = dir.clone();
                    async move { client.create_folder(&dir).await }
                })
                .await?;
            let id = folder.resource_id.unwrap_or_else(|| dir.clone());
            self.folders.lock().await.insert(dir, id);
        }
        Ok(())
    }
}

impl FileStore for VaultFileStore {
    async fn get_files(&self) -> Result<Vec<StoredFile>, StoreError> {
        let resources = self
            .run(|client| async move { client.list_all_files(200).await })
            .await?;
        let mut folders = self.folders.lock().await;
        for resource in &resources {
            if resource.resource_type == ResourceType::Dir {
                let id = resource
                    .resource_id
                    .clone()
                    .unwrap_or_else(|| resource.path.clone());
                folders.insert(resource.path.clone(), id);
            }
        }
        Ok(resources
            .into_iter()
            .map(|resource| StoredFile {
                is_dir: resource.resource_type == ResourceType::Dir,
                path: resource.path,
            })
            .collect())
    }

    async fn file_exists(&self, path: &str) -> Result<bool, StoreError> {
        let resource = self
            .run(|client| async move { client.stat(path).await })
            .await?;
        Ok(resource.is_some())
    }

    async fn get_modified_time(&self, path: &str) -> Result<OffsetDateTime, StoreError> {
        let resource = self
            .run(|client| async move { client.stat(path).await })
            .await?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let modified = resource
            .modified
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Ok(OffsetDateTime::parse(&modified, &Rfc3339)?)
    }

    async fn get_file_contents(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.run(|client| async move { client.download(path).await })
            .await
    }

    async fn write_file_contents(&self, path: &str, contents: Vec<u8>) -> Result<(), StoreError> {
        self.ensure_parent_folders(path).await?;
        self.run(|client| {
            let contents = contents.clone();
            async move { client.upload(path, contents).await }
        })
        .await
    }

    async fn delete_file(&self, path: &str) -> Result<(), StoreError> {
        self.run(|client| async move { client.delete(path).await })
            .await
    }

    async fn delete_all_files(&self) -> Result<(), StoreError> {
        self.run(|client| async move { client.purge().await }).await
    }
}

fn parent_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let (parent, _) = trimmed.rsplit_once('/')?;
    if parent.is_empty() || parent == "." {
        None
    } else {
        Some(parent.to_string())
    }
}
