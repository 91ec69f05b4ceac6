//! Purpose: Shared library crate used by the `collavo` CLI, server, and tests.
//! Exports: `core` (sessions, invitations, notices, errors) and `api`
//! (guarded HTTP client, notice listener, stable re-exports).
//! Invariants: Binaries and tests consume the `api` surface, not `core` paths.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
