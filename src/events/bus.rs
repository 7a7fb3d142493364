//! Synchronous in-process publish/subscribe for dream change events.
//!
//! Handlers are keyed by `EventKind` and invoked in subscription order on
//! the publishing thread. A handler that errors or panics is logged and
//! skipped; the rest still run.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};

use crate::domain::{DreamEvent, EventKind};
use crate::error::Result;

/// Callback registered for one event kind
pub type Handler = Arc<dyn Fn(&DreamEvent) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(u64, Handler)>>,
}

/// Shared handle to the bus; clones publish to the same subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let counts: HashMap<EventKind, usize> = registry.handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    ///
    /// The handler stays registered until the returned `Subscription` is
    /// dropped or `unsubscribe`d.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&DreamEvent) -> Result<()> + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        debug!("Subscribed handler {} to {}", id, kind);

        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Deliver `event` to every handler subscribed to its kind.
    ///
    /// Returns how many handlers completed without error. Handlers run over
    /// a snapshot taken before the first call, so they may subscribe or
    /// unsubscribe freely.
    pub fn publish(&self, event: &DreamEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(u64, Handler)> = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.handlers.get(&kind).cloned().unwrap_or_default()
        };
        debug!("Publishing {} to {} handlers", kind, snapshot.len());

        let mut delivered = 0;
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!("Handler {} for {} failed: {}", id, kind, e),
                Err(panic) => warn!("Handler {} for {} panicked: {}", id, kind, panic_message(&*panic)),
            }
        }
        delivered
    }

    /// Number of live handlers for `kind`
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.handlers.get(&kind).map_or(0, Vec::len)
    }
}

/// Registration handle; unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Remove the handler now.
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handlers) = registry.handlers.get_mut(&self.kind) {
            handlers.retain(|(id, _)| *id != self.id);
        }
        debug!("Unsubscribed handler {} from {}", self.id, self.kind);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
