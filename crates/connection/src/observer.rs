//! Observer registration and synchronous fan-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::warn;

use crate::types::{ConnectionEvent, ConnectionState};

/// Receives notifications from a [`ConnectionManager`](crate::ConnectionManager).
///
/// Callbacks run synchronously on the manager's tasks, in the order the
/// underlying transitions or frames occur. Keep them short; hand heavy work
/// off to a channel or a spawned task.
pub trait ConnectionObserver: Send + Sync {
    /// The connected/not-connected flag flipped.
    fn on_connection_changed(&self, _connected: bool) {}

    /// Every state transition, including the ones that do not flip the
    /// connected flag (Disconnected <-> Connecting).
    fn on_state_changed(&self, _state: ConnectionState) {}

    /// A text message arrived from the peer.
    fn on_message(&self, _message: &str) {}
}

/// Handle returned by [`Observers::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered observers, notified in registration order.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: AtomicU64,
    list: RwLock<Vec<(SubscriptionId, Arc<dyn ConnectionObserver>)>>,
}

impl Observers {
    pub(crate) fn subscribe(&self, observer: Arc<dyn ConnectionObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.list
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut list = self.list.write().unwrap_or_else(PoisonError::into_inner);
        let before = list.len();
        list.retain(|(sid, _)| *sid != id);
        list.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Snapshot so callbacks run without holding the registry lock; an
    /// observer may (un)subscribe from inside a callback.
    fn snapshot(&self) -> Vec<Arc<dyn ConnectionObserver>> {
        self.list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, o)| o.clone())
            .collect()
    }

    pub(crate) fn connection_changed(&self, connected: bool) {
        for observer in self.snapshot() {
            observer.on_connection_changed(connected);
        }
    }

    pub(crate) fn state_changed(&self, state: ConnectionState) {
        for observer in self.snapshot() {
            observer.on_state_changed(state);
        }
    }

    pub(crate) fn message(&self, message: &str) {
        for observer in self.snapshot() {
            observer.on_message(message);
        }
    }
}

/// Observer that forwards every notification into an mpsc channel.
///
/// Uses `try_send` so a slow consumer never stalls the receive loop; events
/// that do not fit are logged and dropped.
pub struct ChannelObserver {
    tx: mpsc::Sender<ConnectionEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<ConnectionEvent>) -> Self {
        Self { tx }
    }

    fn forward(&self, event: ConnectionEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("failed to forward connection event: {e}");
        }
    }
}

impl ConnectionObserver for ChannelObserver {
    fn on_connection_changed(&self, connected: bool) {
        self.forward(ConnectionEvent::ConnectionChanged { connected });
    }

    fn on_state_changed(&self, state: ConnectionState) {
        self.forward(ConnectionEvent::StateChanged(state));
    }

    fn on_message(&self, message: &str) {
        self.forward(ConnectionEvent::MessageReceived(message.to_string()));
    }
}
