//! Purpose: Redirect away from views whose project was deleted elsewhere.
//! Exports: `Router`, `DeletionListener`, `DEFAULT_FALLBACK_PATH`.
//! Role: Consumer side of the `ProjectDeleted` notice.
//! Invariants: Exactly one `replace` per handled notice; other notice kinds
//! are ignored with no side effects.
//! Invariants: Deregistration is tied to the returned `Subscription`.

use crate::core::bus::{Dispatch, NoticeBus, ProjectNotice, Subscription};
use std::sync::Arc;

pub const DEFAULT_FALLBACK_PATH: &str = "/dashboard";

/// Client-side navigation. `replace` swaps the current location without
/// pushing a history entry and is infallible by contract.
pub trait Router: Send + Sync {
    fn replace(&self, path: &str);
}

pub struct DeletionListener {
    router: Arc<dyn Router>,
    fallback: String,
}

impl DeletionListener {
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self {
            router,
            fallback: DEFAULT_FALLBACK_PATH.to_string(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Register on `bus`. The listener stays active until the returned
    /// subscription is dropped.
    pub fn attach(self, bus: &NoticeBus) -> Subscription {
        bus.subscribe(move |notice| self.on_notice(notice))
    }

    fn on_notice(&self, notice: &ProjectNotice) -> Dispatch {
        let ProjectNotice::ProjectDeleted { redirect_to } = notice else {
            return Dispatch::Ignored;
        };
        let destination = redirect_to
            .as_deref()
            .filter(|path| !path.is_empty())
            .unwrap_or(&self.fallback);
        self.router.replace(destination);
        Dispatch::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_FALLBACK_PATH, DeletionListener, Router};
    use crate::core::bus::{NoticeBus, ProjectNotice};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingRouter {
        replaced: Mutex<Vec<String>>,
    }

    impl Router for RecordingRouter {
        fn replace(&self, path: &str) {
            self.replaced
                .lock()
                .expect("replaced lock")
                .push(path.to_string());
        }
    }

    impl RecordingRouter {
        fn paths(&self) -> Vec<String> {
            self.replaced.lock().expect("replaced lock").clone()
        }
    }

    fn deleted(redirect_to: Option<&str>) -> ProjectNotice {
        ProjectNotice::ProjectDeleted {
            redirect_to: redirect_to.map(str::to_string),
        }
    }

    fn listener(router: &Arc<RecordingRouter>) -> DeletionListener {
        DeletionListener::new(Arc::clone(router) as Arc<dyn Router>)
    }

    #[test]
    fn redirect_target_navigates_exactly_once() {
        let bus = NoticeBus::new();
        let router = Arc::new(RecordingRouter::default());
        let _subscription = listener(&router).attach(&bus);

        let outcome = bus.publish(&deleted(Some("/projects/42")));
        assert!(outcome.handled);
        assert_eq!(router.paths(), vec!["/projects/42"]);
    }

    #[test]
    fn missing_redirect_uses_default_fallback() {
        let bus = NoticeBus::new();
        let router = Arc::new(RecordingRouter::default());
        let _subscription = listener(&router).attach(&bus);

        bus.publish(&deleted(None));
        assert_eq!(router.paths(), vec![DEFAULT_FALLBACK_PATH]);
    }

    #[test]
    fn empty_redirect_uses_configured_fallback() {
        let bus = NoticeBus::new();
        let router = Arc::new(RecordingRouter::default());
        let _subscription = listener(&router)
            .with_fallback("/projects")
            .attach(&bus);

        bus.publish(&deleted(Some("")));
        assert_eq!(router.paths(), vec!["/projects"]);
    }

    #[test]
    fn detached_listener_no_longer_navigates() {
        let bus = NoticeBus::new();
        let router = Arc::new(RecordingRouter::default());
        let subscription = listener(&router).attach(&bus);
        drop(subscription);

        let outcome = bus.publish(&deleted(Some("/projects/42")));
        assert!(!outcome.handled);
        assert!(router.paths().is_empty());
    }

    #[test]
    fn foreign_notice_kinds_are_ignored() {
        let bus = NoticeBus::new();
        let router = Arc::new(RecordingRouter::default());
        let _subscription = listener(&router).attach(&bus);

        let outcome = bus.publish(&ProjectNotice::PermissionsChanged {
            project_id: "p-1".to_string(),
        });
        assert!(!outcome.handled);
        assert!(router.paths().is_empty());
    }

    #[test]
    fn duplicate_publishes_navigate_each_time() {
        let bus = NoticeBus::new();
        let router = Arc::new(RecordingRouter::default());
        let _subscription = listener(&router).attach(&bus);

        bus.publish(&deleted(Some("/projects/42")));
        bus.publish(&deleted(Some("/projects/42")));
        assert_eq!(router.paths(), vec!["/projects/42", "/projects/42"]);
    }
}
