//! Public types for the connection manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live transport. Initial state, and the state between attempts.
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Handshake completed, receive loop running.
    Connected,
    /// Shutdown requested. Terminal.
    Closing,
}

impl ConnectionState {
    /// Returns `true` only for [`ConnectionState::Connected`].
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Events emitted through [`ConnectionManager::events`](crate::ConnectionManager::events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connected/not-connected flag flipped.
    ConnectionChanged { connected: bool },
    /// Any state transition, including Disconnected <-> Connecting.
    StateChanged(ConnectionState),
    /// A text frame was received from the peer.
    MessageReceived(String),
}

/// Fixed-delay reconnection policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Wait between a lost connection (or failed attempt) and the next attempt.
    #[serde(rename = "delayMilliseconds", default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_delay(delay: Duration) -> Self {
        Self {
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The fixed wait before every reconnect attempt.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Tunables for the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    pub reconnect: ReconnectPolicy,
    /// Upper bound on a single transport handshake.
    pub connect_timeout_ms: u64,
    /// Keepalive ping period. `0` disables keepalive pings.
    pub ping_interval_ms: u64,
    /// Largest inbound message accepted from the peer, in bytes.
    pub max_message_size: usize,
    /// Upper bound on the close handshake when a session is torn down.
    pub close_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            connect_timeout_ms: 10_000,
            ping_interval_ms: 30_000,
            max_message_size: 1024 * 1024,
            close_timeout_ms: 2_000,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_ms > 0).then(|| Duration::from_millis(self.ping_interval_ms))
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

/// Capacity of the per-session outbound frame queue.
pub(crate) const WRITE_QUEUE_SIZE: usize = 64;
