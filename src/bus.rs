//! Event bus: synchronous fan-out of `Event`s to observers.
//!
//! DESIGN
//! ======
//! `publish` delivers on the caller's task before returning, in registration
//! order. The observer list is cloned out of the lock first, so observers may
//! subscribe or unsubscribe from inside a callback; the change applies to the
//! next publish.
//!
//! Async consumers use `channel`, which registers an observer that forwards
//! clones into an unbounded tokio channel. A forwarder whose receiver has
//! been dropped is removed on the next publish that reaches it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::event::{Event, EventKind, Named};

/// Observer callback. Receives a borrowed event; clone it to keep it.
pub type Observer = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    /// `None` receives every kind.
    kind: Option<EventKind>,
    observer: Observer,
}

impl Subscription {
    fn wants(&self, event: &Event) -> bool {
        self.kind.is_none_or(|k| k == event.kind())
    }
}

#[derive(Default)]
struct Inner {
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
}

/// Shared handle to one observer registry. Clones publish to the same set.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for one event kind, or all kinds with `None`.
    pub fn subscribe<F>(&self, kind: Option<EventKind>, observer: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscription { id, kind, observer: Arc::new(observer) });
        debug!(id = id.0, kind = ?kind, "bus: subscribed");
        id
    }

    pub fn subscribe_all<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(None, observer)
    }

    /// Remove an observer. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.lock();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        before != subs.len()
    }

    /// Forward matching events into a channel for async consumption.
    #[must_use]
    pub fn channel(&self, kind: Option<EventKind>) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::downgrade(&self.inner);
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let own_id = Arc::clone(&slot);

        let id = self.subscribe(kind, move |event| {
            if tx.send(event.clone()).is_err() {
                let id = *own_id.lock().unwrap_or_else(PoisonError::into_inner);
                if let (Some(id), Some(inner)) = (id, registry.upgrade()) {
                    EventBus { inner }.unsubscribe(id);
                    debug!(id = id.0, "bus: channel receiver dropped, observer removed");
                }
            }
        });
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
        rx
    }

    /// Deliver `event` to every matching observer. Returns the delivery count.
    pub fn publish(&self, event: &Event) -> usize {
        let targets: Vec<Subscription> = self.lock().iter().filter(|s| s.wants(event)).cloned().collect();

        debug!(name = event.name(), origin = %event.target(), observers = targets.len(), "bus: publish");
        for sub in &targets {
            (sub.observer)(event);
        }
        targets.len()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "bus_test.rs"]
mod tests;
