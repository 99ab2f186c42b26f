//! Per-wallet listener registry for `connect` and `disconnect`.

use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletEvent {
    Connect,
    Disconnect,
}

impl WalletEvent {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for WalletEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Handle returned by [`EventRegistry::on`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default, Clone)]
pub struct EventRegistry {
    next_id: u64,
    listeners: HashMap<WalletEvent, Vec<(ListenerId, Listener)>>,
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("connect", &self.listener_count(WalletEvent::Connect))
            .field("disconnect", &self.listener_count(WalletEvent::Disconnect))
            .finish()
    }
}

impl EventRegistry {
    pub fn on(
        &mut self,
        event: WalletEvent,
        listener: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(event)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns false when `id` was not registered for `event`.
    pub fn off(&mut self, event: WalletEvent, id: ListenerId) -> bool {
        let Some(listeners) = self.listeners.get_mut(&event) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn remove_all(&mut self, event: WalletEvent) {
        self.listeners.remove(&event);
    }

    /// Calls every listener for `event` in registration order; returns whether any ran.
    pub fn emit(&self, event: WalletEvent, args: &[Value]) -> bool {
        let Some(listeners) = self.listeners.get(&event) else {
            return false;
        };
        for (_, listener) in listeners {
            listener(args);
        }
        !listeners.is_empty()
    }

    pub fn listener_count(&self, event: WalletEvent) -> usize {
        self.listeners.get(&event).map_or(0, Vec::len)
    }
}
