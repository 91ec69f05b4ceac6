//! Purpose: Provide the in-process notice channel for cross-component signals.
//! Exports: `NoticeBus`, `ProjectNotice`, `Dispatch`, `DispatchOutcome`, `Subscription`.
//! Role: Typed publish/subscribe registry replacing ad-hoc global events.
//! Invariants: Delivery is synchronous and follows registration order.
//! Invariants: Every subscriber registered at publish time is invoked; the
//! outcome aggregates `handled` across all of them.
//! Invariants: Dropping a `Subscription` deregisters its handler.

use std::sync::{Arc, Mutex};

/// Notices raised while classifying failed project requests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProjectNotice {
    /// The project backing the current view no longer exists. Consumers
    /// navigate to `redirect_to` when present, else their own fallback.
    ProjectDeleted { redirect_to: Option<String> },
    /// The caller's role on a project changed; permission caches are stale.
    PermissionsChanged { project_id: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dispatch {
    Handled,
    Ignored,
}

/// Aggregate result of one `publish` call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DispatchOutcome {
    pub handled: bool,
    pub deliveries: usize,
}

type Handler = Arc<dyn Fn(&ProjectNotice) -> Dispatch + Send + Sync>;

struct Registry {
    next_id: u64,
    subscribers: Vec<(u64, Handler)>,
}

#[derive(Clone)]
pub struct NoticeBus {
    registry: Arc<Mutex<Registry>>,
}

/// Deregistration guard returned by `subscribe`. The handler stays
/// registered for exactly as long as this guard is alive.
pub struct Subscription {
    registry: Arc<Mutex<Registry>>,
    id: u64,
}

impl NoticeBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn subscribe(
        &self,
        handler: impl Fn(&ProjectNotice) -> Dispatch + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = lock_registry(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, Arc::new(handler)));
        Subscription {
            registry: Arc::clone(&self.registry),
            id,
        }
    }

    /// Deliver `notice` to the subscribers registered right now, in
    /// registration order. Handlers run outside the registry lock, so a
    /// handler may subscribe or drop subscriptions without deadlocking;
    /// such changes take effect on the next publish.
    pub fn publish(&self, notice: &ProjectNotice) -> DispatchOutcome {
        let handlers: Vec<Handler> = {
            let registry = lock_registry(&self.registry);
            registry
                .subscribers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        let mut handled = false;
        for handler in &handlers {
            if handler(notice) == Dispatch::Handled {
                handled = true;
            }
        }
        DispatchOutcome {
            handled,
            deliveries: handlers.len(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock_registry(&self.registry).subscribers.len()
    }
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut registry = lock_registry(&self.registry);
        registry.subscribers.retain(|(id, _)| *id != self.id);
    }
}

fn lock_registry(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poison| poison.into_inner())
}
