//! Connect/reconnect loop with a fixed retry delay.
//!
//! One supervisor task per manager. It owns the live [`Session`], opens a
//! new one whenever the previous attempt failed or the previous session
//! ended, and never gives up until the shutdown scope is cancelled.

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::futures::Notified;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::manager::Inner;
use crate::session::Session;
use crate::transport::TransportChannel;
use crate::types::ConnectionState;

/// Runs connection cycles until shutdown.
///
/// `first_attempt` is signalled once the first attempt has either
/// connected or failed, which is what [`ConnectionManager::connect`]
/// waits for.
///
/// [`ConnectionManager::connect`]: crate::ConnectionManager::connect
pub(crate) async fn supervise(inner: Arc<Inner>, first_attempt: oneshot::Sender<()>) {
    let mut first_attempt = Some(first_attempt);
    let mut attempt: u64 = 0;

    loop {
        if inner.scope.is_cancelled() {
            break;
        }

        attempt = attempt.saturating_add(1);
        inner.transition(ConnectionState::Connecting);
        info!(endpoint = %inner.endpoint, attempt, "connecting");

        // Registered before this cycle can reach Disconnected, so a
        // connect() landing right after that transition still wakes us.
        let wake = inner.wake.notified();
        tokio::pin!(wake);
        wake.as_mut().enable();

        match open(&inner).await {
            Ok(channel) => {
                attempt = 0;
                let mut session = Session::start(
                    channel,
                    inner.observers.clone(),
                    &inner.config,
                    &inner.scope,
                );
                inner.set_writer(Some(session.writer()));
                inner.transition(ConnectionState::Connected);
                info!(endpoint = %inner.endpoint, "connected");
                if let Some(tx) = first_attempt.take() {
                    let _ = tx.send(());
                }

                session.lost().await;
                inner.set_writer(None);
                session.close().await;

                if inner.scope.is_cancelled() {
                    break;
                }
                warn!(endpoint = %inner.endpoint, "connection lost");
                inner.transition(ConnectionState::Disconnected);
            }
            Err(ConnectionError::Cancelled) => break,
            Err(e) => {
                warn!(
                    endpoint = %inner.endpoint,
                    attempt,
                    error = %e,
                    "connection attempt failed"
                );
                inner.transition(ConnectionState::Disconnected);
                if let Some(tx) = first_attempt.take() {
                    let _ = tx.send(());
                }
            }
        }

        if !wait_reconnect_delay(&inner, wake).await {
            break;
        }
    }

    debug!(endpoint = %inner.endpoint, "connection supervisor stopped");
}

/// Opens a transport, bounded by the connect timeout and the shutdown scope.
async fn open(inner: &Inner) -> Result<TransportChannel, ConnectionError> {
    let attempt = inner.connector.open(&inner.endpoint, &inner.config);
    tokio::select! {
        biased;
        _ = inner.scope.cancelled() => Err(ConnectionError::Cancelled),
        result = tokio::time::timeout(inner.config.connect_timeout(), attempt) => {
            match result {
                Ok(r) => r,
                Err(_) => Err(ConnectionError::Timeout),
            }
        }
    }
}

/// Waits out the reconnect delay, or less if `wake` fires. Returns `false`
/// if shutdown was requested before or during the wait.
async fn wait_reconnect_delay(inner: &Inner, wake: Pin<&mut Notified<'_>>) -> bool {
    if inner.scope.is_cancelled() {
        return false;
    }

    let delay = inner.config.reconnect.delay();
    info!(
        endpoint = %inner.endpoint,
        delay_ms = inner.config.reconnect.delay_ms,
        "reconnecting after delay"
    );

    tokio::select! {
        biased;
        _ = inner.scope.cancelled() => {
            debug!("reconnect cancelled");
            return false;
        }
        _ = wake => {
            debug!("reconnect delay cut short");
        }
        _ = tokio::time::sleep(delay) => {}
    }

    !inner.scope.is_cancelled()
}
