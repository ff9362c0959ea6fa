//! Receive loop: decodes text frames and hands them to observers.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::Outbound;
use crate::observer::Observers;

/// Reads frames until the session ends, dispatching text payloads in the
/// order they arrive.
///
/// However the loop ends (close frame, read error, end of stream or a
/// panicking observer) the session token is cancelled so the supervisor
/// tears the handle down and schedules a reconnect.
pub(crate) async fn read_pump<S>(
    mut read: S,
    observers: Arc<Observers>,
    write_tx: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    // Ends the session on every exit, including an observer panic.
    let _guard = cancel.clone().drop_guard();

    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = read.next() => msg,
        };

        match msg {
            Some(Ok(tungstenite::Message::Text(text))) => {
                trace!(len = text.len(), "received text frame");
                observers.message(text.as_str());
            }
            Some(Ok(tungstenite::Message::Ping(data))) => {
                trace!("received ping, sending pong");
                if write_tx
                    .try_send(Outbound::control(tungstenite::Message::Pong(data)))
                    .is_err()
                {
                    debug!("write queue unavailable, pong skipped");
                }
            }
            Some(Ok(tungstenite::Message::Pong(_))) => {
                trace!("received pong");
            }
            Some(Ok(tungstenite::Message::Close(frame))) => {
                debug!(?frame, "received close frame");
                break;
            }
            Some(Ok(tungstenite::Message::Binary(data))) => {
                debug!(len = data.len(), "ignoring binary frame");
            }
            Some(Ok(tungstenite::Message::Frame(_))) => {}
            Some(Err(e)) => {
                warn!("WebSocket read error: {e}");
                break;
            }
            None => {
                debug!("WebSocket stream ended");
                break;
            }
        }
    }
}
