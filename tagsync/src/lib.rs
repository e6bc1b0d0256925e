pub mod cipher;
pub mod config;
pub mod paths;
pub mod state;
pub mod store;
pub mod sync;

use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::cipher::{ChaChaCipher, ContentCipher, IdentityCipher};
use crate::config::Session;
use crate::state::LocalStateData;
use crate::store::FileStore;
use crate::store::local::LocalFileStore;
use crate::store::remote::VaultFileStore;
use crate::sync::engine::Syncer;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Skip the upload comparison and always pull remote copies down.
    pub force_download: bool,
    /// Use the identity cipher instead of real encryption.
    pub dont_encrypt: bool,
}

/// Runs one synchronization (plus the one extra pass a freshly-downloaded
/// global config asks for) and persists the local state.
pub async fn run_sync(options: SyncOptions) -> anyhow::Result<()> {
    let session = Session::load().context("cannot load vault session")?;
    let session_path = paths::expand(config::SESSION_PATH)?;
    let state_path = paths::expand(config::LOCAL_STATE_PATH)?;
    let state =
        LocalStateData::load_from(&state_path).context("cannot read local sync state")?;

    let remote =
        VaultFileStore::new(session, session_path).context("cannot reach the vault")?;

    if options.dont_encrypt {
        run_sync_with(
            remote,
            IdentityCipher,
            state,
            &state_path,
            options.force_download,
        )
        .await
    } else {
        let key = config::load_or_create_key().context("encryption key unavailable")?;
        run_sync_with(
            remote,
            ChaChaCipher::new(key),
            state,
            &state_path,
            options.force_download,
        )
        .await
    }
}

async fn run_sync_with<C: ContentCipher>(
    remote: VaultFileStore,
    cipher: C,
    state: LocalStateData,
    state_path: &Path,
    force_download: bool,
) -> anyhow::Result<()> {
    let global = config::load_global().context("cannot read global config")?;
    let local_config = config::load_local().context("cannot read local config")?;

    let mut syncer = Syncer::new(LocalFileStore, remote, cipher, state, force_download);
    let summary = syncer.run_pass(&global, &local_config).await?;

    if summary.config_downloaded {
        info!("global configuration changed remotely; running one more pass");
        let global = config::load_global().context("cannot re-read global config")?;
        let local_config = config::load_local().context("cannot re-read local config")?;
        syncer.run_pass(&global, &local_config).await?;
    }

    syncer
        .into_state()
        .save_to(state_path)
        .context("cannot persist local sync state")?;
    Ok(())
}

/// Deletes every object in the vault after an explicit confirmation.
pub async fn delete_all_remote_files(assume_yes: bool) -> anyhow::Result<()> {
    if !assume_yes && !confirm("Delete ALL files stored in the vault? [y/N] ")? {
        println!("Aborted.");
        return Ok(());
    }
    let session = Session::load().context("cannot load vault session")?;
    let session_path = paths::expand(config::SESSION_PATH)?;
    let remote =
        VaultFileStore::new(session, session_path).context("cannot reach the vault")?;
    remote.delete_all_files().await?;
    info!("all remote files deleted");
    Ok(())
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
