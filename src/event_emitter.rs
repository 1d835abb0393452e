use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::engine::Database;
use crate::error::DatastoreError;

/// Lifecycle event names an adapter publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Error,
    Disconnected,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connected => "DB_CONNECTED",
            EventKind::Error => "DB_ERROR",
            EventKind::Disconnected => "DB_DISCONNECTED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload delivered to listeners. Borrows live only for the notification.
#[derive(Debug, Clone, Copy)]
pub enum AdapterEvent<'a> {
    Connected(&'a Database),
    Error(&'a DatastoreError),
    Disconnected { database: &'a str },
}

impl AdapterEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            AdapterEvent::Connected(_) => EventKind::Connected,
            AdapterEvent::Error(_) => EventKind::Error,
            AdapterEvent::Disconnected { .. } => EventKind::Disconnected,
        }
    }
}

/// Registered callback. Receives every event of the kind it was registered for.
pub type Listener = Arc<dyn for<'a> Fn(&AdapterEvent<'a>) + Send + Sync>;

/// Publish/subscribe registry: event kind to listeners, in registration order.
pub struct EventEmitter {
    listeners: RwLock<HashMap<EventKind, Vec<Listener>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        EventEmitter {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: for<'a> Fn(&AdapterEvent<'a>) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.entry(kind).or_default().push(Arc::new(listener));
    }

    /// Call every listener registered for the event's kind.
    ///
    /// Listeners run after the registry lock is released, so they may register more listeners.
    pub fn notify(&self, event: &AdapterEvent<'_>) {
        let kind = event.kind();
        let listeners: Vec<Listener> = {
            let registry = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            registry.get(&kind).cloned().unwrap_or_default()
        };
        tracing::trace!(event = %kind, listeners = listeners.len(), "notify");
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub fn remove_all(&self, kind: EventKind) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind);
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&'static str, usize> =
            registry.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("EventEmitter").field("listeners", &counts).finish()
    }
}
