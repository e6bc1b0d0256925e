use time::OffsetDateTime;

use crate::state::has_been_synced;

/// Observable facts about one file, gathered by the engine before deciding.
/// Modification times are only meaningful when the corresponding existence
/// flag is set; a remote directory entry never carries one.
#[derive(Debug, Clone)]
pub struct FileFacts {
    pub exists_locally: bool,
    pub exists_remotely: bool,
    pub remote_is_dir: bool,
    pub force_download: bool,
    pub modified_local: Option<OffsetDateTime>,
    pub modified_remote: Option<OffsetDateTime>,
    pub last_cloud_update: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Download,
    Upload,
    MarkDeleted,
    Nothing,
}

/// Picks exactly one action. The order is fixed: download wins over upload
/// (an ambiguous path seen on both sides for the first time is pulled, not
/// pushed), upload wins over mark-deleted.
pub fn decide(facts: &FileFacts) -> SyncAction {
    if wants_download(facts) {
        SyncAction::Download
    } else if wants_upload(facts) {
        SyncAction::Upload
    } else if wants_mark_deleted(facts) {
        SyncAction::MarkDeleted
    } else {
        SyncAction::Nothing
    }
}

fn wants_download(facts: &FileFacts) -> bool {
    if !facts.exists_remotely || facts.remote_is_dir {
        return false;
    }
    if facts.force_download {
        return true;
    }
    if !facts.exists_locally {
        // First-ever pull. A locally-missing file that *has* synced before
        // is a local deletion, handled below.
        return !has_been_synced(facts.last_cloud_update);
    }
    match (facts.modified_local, facts.modified_remote) {
        (Some(local), Some(remote)) => remote > local && facts.last_cloud_update < remote,
        _ => false,
    }
}

fn wants_upload(facts: &FileFacts) -> bool {
    if !facts.exists_locally {
        return false;
    }
    if !facts.exists_remotely {
        return true;
    }
    match (facts.modified_local, facts.modified_remote) {
        (Some(local), Some(remote)) => {
            local > remote
                && has_been_synced(facts.last_cloud_update)
                && local > facts.last_cloud_update
        }
        _ => false,
    }
}

fn wants_mark_deleted(facts: &FileFacts) -> bool {
    !facts.exists_locally && has_been_synced(facts.last_cloud_update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::never_synced;
    use time::macros::datetime;

    fn at(hour: u8) -> OffsetDateTime {
        datetime!(2021-10-01 00:00:00 UTC)
            .replace_hour(hour)
            .unwrap()
    }

    fn both_sides(local_hour: u8, remote_hour: u8, last_update: OffsetDateTime) -> FileFacts {
        FileFacts {
            exists_locally: true,
            exists_remotely: true,
            remote_is_dir: false,
            force_download: false,
            modified_local: Some(at(local_hour)),
            modified_remote: Some(at(remote_hour)),
            last_cloud_update: last_update,
        }
    }

    #[test]
    fn first_push_when_only_local() {
        let facts = FileFacts {
            exists_locally: true,
            exists_remotely: false,
            remote_is_dir: false,
            force_download: false,
            modified_local: Some(at(9)),
            modified_remote: None,
            last_cloud_update: never_synced(),
        };
        assert_eq!(decide(&facts), SyncAction::Upload);
    }

    #[test]
    fn first_pull_when_only_remote() {
        let facts = FileFacts {
            exists_locally: false,
            exists_remotely: true,
            remote_is_dir: false,
            force_download: false,
            modified_local: None,
            modified_remote: Some(at(9)),
            last_cloud_update: never_synced(),
        };
        assert_eq!(decide(&facts), SyncAction::Download);
    }

    #[test]
    fn local_wins_when_newer_and_synced() {
        // local 9:00, remote 8:00, last update 7:00
        assert_eq!(decide(&both_sides(9, 8, at(7))), SyncAction::Upload);
    }

    #[test]
    fn remote_wins_when_newer_and_synced() {
        // local 8:00, remote 9:00, last update 7:00
        assert_eq!(decide(&both_sides(8, 9, at(7))), SyncAction::Download);
    }

    #[test]
    fn unchanged_file_is_a_no_op() {
        // Both mtimes predate the last update; nothing to move.
        assert_eq!(decide(&both_sides(7, 8, at(9))), SyncAction::Nothing);
    }

    #[test]
    fn never_synced_local_edit_does_not_upload_over_remote() {
        // The path exists on both sides but this machine has never synced
        // it; pushing would clobber a copy it has never seen.
        assert_eq!(
            decide(&both_sides(9, 8, never_synced())),
            SyncAction::Nothing
        );
    }

    #[test]
    fn remote_newer_than_last_update_downloads_even_if_older_than_local_is_false() {
        // Remote changed after our last sync and local did not.
        assert_eq!(decide(&both_sides(7, 9, at(8))), SyncAction::Download);
    }

    #[test]
    fn missing_locally_after_sync_marks_deleted() {
        let facts = FileFacts {
            exists_locally: false,
            exists_remotely: true,
            remote_is_dir: false,
            force_download: false,
            modified_local: None,
            modified_remote: Some(at(9)),
            last_cloud_update: at(9),
        };
        assert_eq!(decide(&facts), SyncAction::MarkDeleted);
    }

    #[test]
    fn missing_everywhere_is_nothing() {
        let facts = FileFacts {
            exists_locally: false,
            exists_remotely: false,
            remote_is_dir: false,
            force_download: false,
            modified_local: None,
            modified_remote: None,
            last_cloud_update: never_synced(),
        };
        assert_eq!(decide(&facts), SyncAction::Nothing);
    }

    #[test]
    fn force_download_overrides_newer_local_copy() {
        let mut facts = both_sides(9, 8, at(7));
        facts.force_download = true;
        assert_eq!(decide(&facts), SyncAction::Download);
    }

    #[test]
    fn force_download_beats_mark_deleted() {
        let facts = FileFacts {
            exists_locally: false,
            exists_remotely: true,
            remote_is_dir: false,
            force_download: true,
            modified_local: None,
            modified_remote: Some(at(9)),
            last_cloud_update: at(9),
        };
        assert_eq!(decide(&facts), SyncAction::Download);
    }

    #[test]
    fn remote_directories_are_never_downloaded() {
        let facts = FileFacts {
            exists_locally: false,
            exists_remotely: true,
            remote_is_dir: true,
            force_download: true,
            modified_local: None,
            modified_remote: None,
            last_cloud_update: never_synced(),
        };
        assert_eq!(decide(&facts), SyncAction::Nothing);
    }

    #[test]
    fn deleted_remotely_but_present_locally_uploads_again() {
        // The remote side lost the file (or another machine GC'd it); the
        // local copy is pushed as a first-ever upload.
        let facts = FileFacts {
            exists_locally: true,
            exists_remotely: false,
            remote_is_dir: false,
            force_download: false,
            modified_local: Some(at(8)),
            modified_remote: None,
            last_cloud_update: at(9),
        };
        assert_eq!(decide(&facts), SyncAction::Upload);
    }
}
