//! Host event subscriptions.
//!
//! Listeners are registered per [`EventKind`] and can be removed
//! independently. Each delivery runs as its own spawned task, started in
//! registration order, so async handlers may interleave at their suspension
//! points just like host callbacks do.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::trace;

use crate::types::events::{EventKind, HostEvent};

/// Handle identifying one registered listener.
pub type ListenerId = u64;

/// Callback invoked for every matching host event.
pub type Listener = Arc<dyn Fn(HostEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Subscription surface consumed by active sessions.
pub trait HostEventsTrait: Send + Sync {
    fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId;
    /// Returns `false` if the listener was already removed.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// In-process event dispatcher used by the in-memory host.
#[derive(Default)]
pub struct EventHub {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<ListenerId, (EventKind, Listener)>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every listener registered for its kind.
    ///
    /// Must be called from within a tokio runtime.
    pub fn emit(&self, event: HostEvent) {
        let kind = event.kind();
        let targets: Vec<Listener> = self
            .listeners
            .lock()
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| l.clone())
            .collect();
        trace!(target: "tabs_aside.events", ?kind, listeners = targets.len(), "emit");
        for listener in targets {
            tokio::spawn(listener(event.clone()));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn listener_count_for(&self, kind: EventKind) -> usize {
        self.listeners.lock().values().filter(|(k, _)| *k == kind).count()
    }
}

impl HostEventsTrait for EventHub {
    fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.listeners.lock().insert(id, (kind, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }
}
