//! Purpose: Define the stable public Rust API boundary for Collavo.
//! Exports: Core types and operations needed by the CLI, server, and tests.
//! Role: Public, additive-only surface; hides internal module layout.
//! Invariants: This module is the only public path consumers should use.

mod client;
mod guard;
mod listener;

pub use crate::core::bus::{Dispatch, DispatchOutcome, NoticeBus, ProjectNotice, Subscription};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::invitations::{
    InvitationStore, JsonFileStore, PendingInvitation, load_invitations, save_invitations,
};
pub use crate::core::session::{Session, SessionResolver, TokenSessions, User};
pub use client::{ApiClient, PendingInvitationsPage};
pub use guard::{ApiErrorBody, Classification, ErrorClassifier, GuardedJson, ProjectGuard};
pub use listener::{DEFAULT_FALLBACK_PATH, DeletionListener, Router};
