use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tagsync::SyncOptions;

#[derive(Debug, Parser)]
#[command(name = "tagsync", version, about = "Tag-scoped encrypted file sync")]
struct Cli {
    /// Log filter, e.g. `info`, `debug` or `tagsync=debug`.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one synchronization pass.
    Sync {
        /// Always pull remote copies, skipping the modification-time
        /// comparison.
        #[arg(long)]
        force_download: bool,
        /// Store plaintext in the vault instead of encrypting.
        #[arg(long)]
        dont_encrypt: bool,
    },
    /// Delete every object stored in the vault.
    DeleteAllRemoteFiles {
        /// Skip the interactive confirmation.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .init();

    match cli.command {
        Command::Sync {
            force_download,
            dont_encrypt,
        } => {
            tagsync::run_sync(SyncOptions {
                force_download,
                dont_encrypt,
            })
            .await
        }
        Command::DeleteAllRemoteFiles { yes } => tagsync::delete_all_remote_files(yes).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::try_parse_from([
            "tagsync",
            "sync",
            "--force-download",
            "--dont-encrypt",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(
            cli.command,
            Command::Sync {
                force_download: true,
                dont_encrypt: true
            }
        ));
    }

    #[test]
    fn parses_delete_all_with_confirmation_flag() {
        let cli = Cli::try_parse_from(["tagsync", "delete-all-remote-files", "--yes"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::DeleteAllRemoteFiles { yes: true }
        ));
    }

    #[test]
    fn rejects_unknown_arguments() {
        assert!(Cli::try_parse_from(["tagsync", "sync", "--bogus"]).is_err());
    }
}
