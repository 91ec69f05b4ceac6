//! Purpose: Define the pending-invitation record and its lookup seam.
//! Exports: `PendingInvitation`, `InvitationStore`, `JsonFileStore`,
//! `load_invitations`, `save_invitations`.
//! Role: Read side of the invitation flow; writes go through the CLI helpers.
//! Invariants: A missing store file reads as an empty store; malformed JSON
//! is an error and must not be masked as "no invitations".
//! Invariants: Invitee email matching is ASCII-case-insensitive.

use crate::core::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct PendingInvitation {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub inviter_email: String,
    pub invitee_email: String,
    pub role: String,
    pub created_at: String,
}

pub trait InvitationStore: Send + Sync {
    fn pending_for(&self, email: &str) -> Result<Vec<PendingInvitation>, Error>;
}

/// JSON-array store on disk, one file per deployment.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InvitationStore for JsonFileStore {
    fn pending_for(&self, email: &str) -> Result<Vec<PendingInvitation>, Error> {
        let invitations = load_invitations(&self.path)?;
        Ok(invitations
            .into_iter()
            .filter(|invitation| invitation.invitee_email.eq_ignore_ascii_case(email))
            .collect())
    }
}

pub fn load_invitations(path: &Path) -> Result<Vec<PendingInvitation>, Error> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(Error::new(map_io_error_kind(&err))
                .with_message("failed to read invitation store")
                .with_path(path)
                .with_source(err));
        }
    };
    serde_json::from_str(&raw).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid invitation store json")
            .with_path(path)
            .with_source(err)
    })
}

pub fn save_invitations(path: &Path, invitations: &[PendingInvitation]) -> Result<(), Error> {
    let mut body = serde_json::to_string_pretty(invitations).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode invitation store")
            .with_source(err)
    })?;
    body.push('\n');
    std::fs::write(path, body).map_err(|err| {
        Error::new(map_io_error_kind(&err))
            .with_message("failed to write invitation store")
            .with_path(path)
            .with_source(err)
    })
}

fn map_io_error_kind(err: &std::io::Error) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound,
        std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        InvitationStore, JsonFileStore, PendingInvitation, load_invitations, save_invitations,
    };
    use crate::core::error::ErrorKind;
    use tempfile::tempdir;

    fn invitation(id: &str, invitee: &str) -> PendingInvitation {
        PendingInvitation {
            id: id.to_string(),
            project_id: "p-1".to_string(),
            project_name: "Research Notes".to_string(),
            inviter_email: "owner@example.com".to_string(),
            invitee_email: invitee.to_string(),
            role: "member".to_string(),
            created_at: "2026-02-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn missing_store_reads_as_empty() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        let pending = store.pending_for("alice@example.com").expect("pending");
        assert!(pending.is_empty());
    }

    #[test]
    fn malformed_store_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("invitations.json");
        std::fs::write(&path, "[ not json").expect("write");

        let err = JsonFileStore::new(&path)
            .pending_for("alice@example.com")
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn pending_for_filters_by_invitee_case_insensitively() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("invitations.json");
        save_invitations(
            &path,
            &[
                invitation("i-1", "alice@example.com"),
                invitation("i-2", "bob@example.com"),
                invitation("i-3", "Alice@Example.com"),
            ],
        )
        .expect("save");

        let pending = JsonFileStore::new(&path)
            .pending_for("ALICE@example.com")
            .expect("pending");
        let ids: Vec<&str> = pending.iter().map(|inv| inv.id.as_str()).collect();
        assert_eq!(ids, vec!["i-1", "i-3"]);
    }

    #[test]
    fn save_then_load_preserves_records() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("invitations.json");
        let records = vec![invitation("i-1", "alice@example.com")];
        save_invitations(&path, &records).expect("save");

        let loaded = load_invitations(&path).expect("load");
        assert_eq!(loaded, records);
    }
}
