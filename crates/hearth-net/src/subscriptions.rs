//! Handler registry for inbound frames.
//!
//! A [`Subscription`] is a guard: dropping it removes the handler, so a
//! component that is torn down can never leave a stale handler behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use hearth_shared::protocol::{EventKind, ServerFrame};

pub(crate) type Handler = Arc<dyn Fn(&ServerFrame) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(u64, Handler)>>,
}

pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    pub(crate) fn insert(registry: &SharedRegistry, kind: EventKind, handler: Handler) -> Subscription {
        let mut guard = lock(registry);
        guard.next_id += 1;
        let id = guard.next_id;
        guard.handlers.entry(kind).or_default().push((id, handler));
        debug!(?kind, id, "Handler subscribed");

        Subscription {
            id,
            kind,
            registry: Arc::downgrade(registry),
        }
    }

    /// Handlers for `kind`, in subscription order. Cloned out so they run
    /// without the registry lock held.
    pub(crate) fn handlers_for(registry: &SharedRegistry, kind: EventKind) -> Vec<Handler> {
        lock(registry)
            .handlers
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn clear(registry: &SharedRegistry) -> usize {
        let mut guard = lock(registry);
        let count = guard.handlers.values().map(Vec::len).sum();
        guard.handlers.clear();
        count
    }

    pub(crate) fn len(registry: &SharedRegistry) -> usize {
        lock(registry).handlers.values().map(Vec::len).sum()
    }

    fn remove(&mut self, kind: EventKind, id: u64) {
        if let Some(list) = self.handlers.get_mut(&kind) {
            list.retain(|(hid, _)| *hid != id);
            if list.is_empty() {
                self.handlers.remove(&kind);
            }
        }
    }
}

/// Unsubscribes its handler when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Explicit form of dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(self.kind, self.id);
            debug!(kind = ?self.kind, id = self.id, "Handler unsubscribed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
