//! Connection manager: public face of the live channel.
//!
//! Owns the endpoint, configuration, observer registry and the shutdown
//! scope. The connect/reconnect loop lives in [`crate::reconnection`] and
//! runs as a single supervisor task per manager.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::endpoint::Endpoint;
use crate::error::ConnectionError;
use crate::observer::{ChannelObserver, ConnectionObserver, Observers, SubscriptionId};
use crate::reconnection::supervise;
use crate::session::SessionWriter;
use crate::transport::{Connector, Frame, WsConnector};
use crate::types::{ConnectionConfig, ConnectionEvent, ConnectionState};

/// Maintains one persistent WebSocket connection and keeps it alive.
///
/// Failures never surface as errors: they become state transitions and
/// reconnect attempts, retried with a fixed delay until [`shutdown`]
/// is called.
///
/// [`shutdown`]: ConnectionManager::shutdown
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

/// State shared between the manager handle and its supervisor task.
pub(crate) struct Inner {
    pub(crate) endpoint: Endpoint,
    pub(crate) config: ConnectionConfig,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) observers: Arc<Observers>,
    state: RwLock<ConnectionState>,
    /// Serializes a state change with its notifications so observers see
    /// transitions in the order they happen.
    transitions: Mutex<()>,
    /// Write handle of the current session, present only while connected.
    writer: Mutex<Option<SessionWriter>>,
    /// Shutdown scope. Cancelled once, never reset.
    pub(crate) scope: CancellationToken,
    /// Cuts a pending reconnect delay short.
    pub(crate) wake: Notify,
    supervisor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Creates a manager that connects over WebSocket.
    pub fn new(endpoint: Endpoint, config: ConnectionConfig) -> Self {
        Self::with_connector(endpoint, config, Arc::new(WsConnector))
    }

    /// Creates a manager with a custom transport.
    pub fn with_connector(
        endpoint: Endpoint,
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint,
                config,
                connector,
                observers: Arc::new(Observers::default()),
                state: RwLock::new(ConnectionState::Disconnected),
                transitions: Mutex::new(()),
                writer: Mutex::new(None),
                scope: CancellationToken::new(),
                wake: Notify::new(),
                supervisor: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Registers an observer. Notifications start with the next transition.
    pub fn subscribe(&self, observer: Arc<dyn ConnectionObserver>) -> SubscriptionId {
        let id = self.inner.observers.subscribe(observer);
        debug!(observers = self.inner.observers.len(), "observer subscribed");
        id
    }

    /// Removes an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Subscribes a [`ChannelObserver`] and returns its receiving end.
    pub fn events(&self, capacity: usize) -> mpsc::Receiver<ConnectionEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        self.subscribe(Arc::new(ChannelObserver::new(tx)));
        rx
    }

    /// Starts the connection if it is not already up or on its way up.
    ///
    /// Waits for the outcome of the first attempt only; a failed attempt is
    /// retried in the background after the reconnect delay. If a reconnect
    /// delay is currently running, it is cut short instead. A supervisor
    /// that died from a panicking observer is replaced.
    pub async fn connect(&self) {
        let first_attempt = {
            let mut supervisor = self.inner.supervisor.lock().await;

            if self.inner.scope.is_cancelled() {
                debug!("connect ignored, manager is shut down");
                return;
            }

            // The supervisor only stops on shutdown; a finished handle here
            // means it panicked, possibly leaving a stale state behind.
            if supervisor.as_ref().is_some_and(JoinHandle::is_finished) {
                warn!("connection supervisor died, restarting");
                *supervisor = None;
                self.inner.set_writer(None);
                self.inner.transition(ConnectionState::Disconnected);
            }

            let state = self.state();
            if matches!(
                state,
                ConnectionState::Connected | ConnectionState::Connecting
            ) {
                trace!(?state, "connect ignored, already active");
                return;
            }

            if supervisor.is_some() {
                debug!("reconnect pending, attempting now");
                self.inner.wake.notify_waiters();
                return;
            }

            let (tx, rx) = oneshot::channel();
            *supervisor = Some(tokio::spawn(supervise(self.inner.clone(), tx)));
            rx
        };

        // Dropped without a value when shutdown wins the race.
        let _ = first_attempt.await;
    }

    /// Sends `message` as one text frame.
    ///
    /// A no-op when not connected: the message is logged and dropped, never
    /// queued. A write failure drops the message and the connection is
    /// treated as lost.
    pub async fn send(&self, message: impl Into<String>) {
        let message = message.into();

        let state = self.state();
        if !state.is_connected() {
            warn!(?state, len = message.len(), "cannot send message, not connected");
            return;
        }
        let Some(writer) = self.inner.current_writer() else {
            warn!(len = message.len(), "cannot send message, connection closing");
            return;
        };

        let len = message.len();
        let result = tokio::select! {
            biased;
            _ = self.inner.scope.cancelled() => Err(ConnectionError::Cancelled),
            r = writer.write(Frame::text(message)) => r,
        };

        match result {
            Ok(()) => trace!(len, "message sent"),
            Err(e) => warn!(len, error = %e, "send failed, message dropped"),
        }
    }

    /// Stops the manager for good.
    ///
    /// Cancels any pending attempt or delay, closes the live connection and
    /// waits for the background work to finish. No observer is called after
    /// this returns. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.inner.scope.cancel();
        let first = self.inner.transition(ConnectionState::Closing);

        let handle = self.inner.supervisor.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
            && e.is_panic()
        {
            warn!("connection supervisor panicked");
        }
        self.inner.set_writer(None);

        if first {
            info!(endpoint = %self.inner.endpoint, "connection manager shut down");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.inner.scope.cancel();
    }
}

impl Inner {
    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `next` and notifies observers.
    ///
    /// Ignored once `Closing` has been reached and when `next` equals the
    /// current state. The boolean notification fires only when the
    /// connected flag flips. Returns whether the transition happened.
    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        let _guard = self
            .transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let prev = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state == ConnectionState::Closing || *state == next {
                return false;
            }
            std::mem::replace(&mut *state, next)
        };

        debug!(from = ?prev, to = ?next, "connection state changed");
        self.observers.state_changed(next);
        if prev.is_connected() != next.is_connected() {
            self.observers.connection_changed(next.is_connected());
        }
        true
    }

    pub(crate) fn set_writer(&self, writer: Option<SessionWriter>) {
        *self.writer.lock().unwrap_or_else(PoisonError::into_inner) = writer;
    }

    fn current_writer(&self) -> Option<SessionWriter> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
