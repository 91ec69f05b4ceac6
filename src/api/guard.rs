//! Purpose: Implement the permission-aware fetch contract for API calls.
//! Exports: `GuardedJson`, `Classification`, `ErrorClassifier`, `ApiErrorBody`,
//! `ProjectGuard`.
//! Role: Single policy point deciding which HTTP failures were already
//! surfaced to the user and which must propagate to the caller.
//! Invariants: `handled` implies no data and no further error surfacing
//! downstream; unhandled failures carry the classifier's message or the
//! literal `"Request failed"`.
//! Invariants: Classification never runs for transport failures or 2xx.

use crate::core::bus::{NoticeBus, ProjectNotice};
use crate::core::error::{Error, ErrorKind};
use serde::Deserialize;

/// Outcome of a guarded JSON fetch. Exactly one of the following holds:
/// the payload parsed (`data` set, `handled` false), or a failure was
/// already surfaced below this layer (`data` empty, `handled` true).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GuardedJson<T> {
    pub data: Option<T>,
    pub handled: bool,
    pub error_message: Option<String>,
}

impl<T> GuardedJson<T> {
    pub(crate) fn parsed(data: T) -> Self {
        Self {
            data: Some(data),
            handled: false,
            error_message: None,
        }
    }

    pub(crate) fn already_handled(error_message: Option<String>) -> Self {
        Self {
            data: None,
            handled: true,
            error_message,
        }
    }
}

/// Verdict returned by an `ErrorClassifier` for one non-2xx response.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Classification {
    pub handled: bool,
    pub error_message: Option<String>,
}

pub trait ErrorClassifier: Send + Sync {
    fn classify(
        &self,
        status: u16,
        body: &str,
        on_permission_refresh: Option<&dyn Fn()>,
    ) -> Classification;
}

/// Structured error body emitted by the Collavo API routes. Unknown or
/// non-JSON bodies parse to the empty shape rather than failing.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

impl ApiErrorBody {
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn message(&self) -> Option<String> {
        self.error.clone().or_else(|| self.details.clone())
    }
}

pub(crate) const PROJECT_DELETED_CODE: &str = "project_deleted";
pub(crate) const PERMISSIONS_CHANGED_CODE: &str = "permissions_changed";

/// Default classifier. Deleted-project failures are broadcast on the
/// notice bus and count as handled exactly when a subscriber navigated;
/// permission failures trigger the refresh callback but still propagate
/// so the caller surfaces them once.
pub struct ProjectGuard {
    bus: NoticeBus,
}

impl ProjectGuard {
    pub fn new(bus: NoticeBus) -> Self {
        Self { bus }
    }

    /// Guard with a private, listener-less bus: every failure propagates.
    pub fn detached() -> Self {
        Self::new(NoticeBus::new())
    }

    pub fn bus(&self) -> &NoticeBus {
        &self.bus
    }
}

impl ErrorClassifier for ProjectGuard {
    fn classify(
        &self,
        status: u16,
        body: &str,
        on_permission_refresh: Option<&dyn Fn()>,
    ) -> Classification {
        let parsed = ApiErrorBody::parse(body);

        let deleted = status == 410 || parsed.code.as_deref() == Some(PROJECT_DELETED_CODE);
        if deleted {
            let outcome = self.bus.publish(&ProjectNotice::ProjectDeleted {
                redirect_to: parsed.redirect_to.clone(),
            });
            return Classification {
                handled: outcome.handled,
                error_message: parsed.message(),
            };
        }

        if matches!(status, 401 | 403) {
            if let Some(refresh) = on_permission_refresh {
                refresh();
            }
            if parsed.code.as_deref() == Some(PERMISSIONS_CHANGED_CODE) {
                if let Some(project_id) = parsed.project_id.clone() {
                    self.bus
                        .publish(&ProjectNotice::PermissionsChanged { project_id });
                }
            }
        }

        Classification {
            handled: false,
            error_message: parsed.message(),
        }
    }
}

/// Apply a classifier verdict to a failed response: resolve when the
/// failure was already surfaced, error otherwise.
pub(crate) fn resolve_failure<T>(
    classifier: &dyn ErrorClassifier,
    status: u16,
    body: &str,
    on_permission_refresh: Option<&dyn Fn()>,
) -> Result<GuardedJson<T>, Error> {
    let verdict = classifier.classify(status, body, on_permission_refresh);
    if verdict.handled {
        return Ok(GuardedJson::already_handled(verdict.error_message));
    }
    let message = verdict
        .error_message
        .unwrap_or_else(|| "Request failed".to_string());
    Err(Error::new(kind_from_status(status))
        .with_message(message)
        .with_status(status))
}

pub(crate) fn kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 => ErrorKind::Usage,
        401 => ErrorKind::Auth,
        403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        410 => ErrorKind::Gone,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}
