use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cipher::KEY_LEN;
use crate::paths::{self, PathError};

/// Global configuration, shared across machines through the vault; always
/// reconciled even though no tag lists it.
pub const GLOBAL_CONFIG_PATH: &str = "~/.config/tagsync/global.yaml";
/// Machine-local tag membership; never leaves this machine.
pub const LOCAL_CONFIG_PATH: &str = "~/.config/tagsync/local.yaml";
/// Per-file sync history used by the reconciliation decision.
pub const LOCAL_STATE_PATH: &str = "~/.config/tagsync/state.json";
/// Orphan bookkeeping for remote garbage collection; lives in the vault.
pub const REMOTE_STATE_PATH: &str = "~/.config/tagsync/state-remote.json";
/// 256-bit content encryption key, hex-encoded.
pub const ENCRYPTION_KEY_PATH: &str = "~/.config/tagsync/encryption.key";
/// Vault endpoint and credentials.
pub const SESSION_PATH: &str = "~/.config/tagsync/session.json";

const DEFAULT_LOCAL_CONFIG: &str = "tags:\n  - all\n";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("encryption key is not valid hex: {0}")]
    KeyEncoding(#[from] hex::FromHexError),
    #[error("encryption key must be {} bits", KEY_LEN * 8)]
    KeyLength,
    #[error("vault session file not found at {0}; create it with server_url, access_token and refresh_token")]
    MissingSession(String),
}

/// Which friendly paths each tag covers. One path may name a single file or
/// a directory root walked recursively.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GlobalConfig {
    #[serde(rename = "paths", default)]
    pub tag_paths: HashMap<String, Vec<String>>,
}

/// The tags this machine belongs to. A configured path is in scope iff at
/// least one tag naming it appears here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub tags: Vec<String>,
}

pub fn load_global() -> Result<GlobalConfig, ConfigError> {
    load_global_from(&paths::expand(GLOBAL_CONFIG_PATH)?)
}

/// A missing global config is an empty one; the first sync pass will pull
/// the shared copy down from the vault.
pub fn load_global_from(path: &Path) -> Result<GlobalConfig, ConfigError> {
    match fs::read(path) {
        Ok(data) => Ok(serde_yaml::from_slice(&data)?),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(GlobalConfig::default()),
        Err(err) => Err(err.into()),
    }
}

pub fn load_local() -> Result<LocalConfig, ConfigError> {
    load_local_from(&paths::expand(LOCAL_CONFIG_PATH)?)
}

/// A missing local config is created with the default `all` tag so a fresh
/// machine starts syncing without manual setup.
pub fn load_local_from(path: &Path) -> Result<LocalConfig, ConfigError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, DEFAULT_LOCAL_CONFIG)?;
            DEFAULT_LOCAL_CONFIG.as_bytes().to_vec()
        }
        Err(err) => return Err(err.into()),
    };
    Ok(serde_yaml::from_slice(&data)?)
}

pub fn load_or_create_key() -> Result<[u8; KEY_LEN], ConfigError> {
    load_or_create_key_at(&paths::expand(ENCRYPTION_KEY_PATH)?)
}

pub fn load_or_create_key_at(path: &Path) -> Result<[u8; KEY_LEN], ConfigError> {
    let encoded = match fs::read_to_string(path) {
        Ok(encoded) => encoded,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut key = [0u8; KEY_LEN];
            OsRng.fill_bytes(&mut key);
            let encoded = hex::encode(key);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &encoded)?;
            restrict_permissions(path)?;
            encoded
        }
        Err(err) => return Err(err.into()),
    };
    let bytes = hex::decode(encoded.trim())?;
    bytes.try_into().map_err(|_| ConfigError::KeyLength)
}

/// Vault endpoint plus the credential pair. The access token is rotated in
/// place when the remote store reauthenticates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Session {
    pub server_url: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&paths::expand(SESSION_PATH)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read(path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ConfigError::MissingSession(
                path.to_string_lossy().into_owned(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        restrict_permissions(path)?;
        Ok(())
    }
}

fn restrict_permissions(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
