//! Write pump: the only task that writes to a session's sink.
//!
//! Every outbound frame goes through one queue and is sent and flushed
//! completely before the next one is taken, so concurrent `send` calls can
//! never interleave on the wire.

use std::time::Duration;

use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Outbound;

/// Drains `write_rx` into `write` until the session is cancelled.
///
/// A failed write cancels the session: the connection is considered lost
/// and the frame is reported back as failed, never retried.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<Outbound>,
    cancel: CancellationToken,
    close_timeout: Duration,
) where
    S: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let _guard = cancel.clone().drop_guard();

    loop {
        let Outbound { frame, done } = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            req = write_rx.recv() => match req {
                Some(req) => req,
                None => break,
            },
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = write.send(frame) => r,
        };

        match result {
            Ok(()) => {
                if let Some(done) = done {
                    let _ = done.send(Ok(()));
                }
            }
            Err(e) => {
                warn!("WebSocket write error: {e}");
                if let Some(done) = done {
                    let _ = done.send(Err(e));
                }
                return;
            }
        }
    }

    match tokio::time::timeout(close_timeout, write.send(tungstenite::Message::Close(None))).await
    {
        Ok(Ok(())) => debug!("close frame sent"),
        Ok(Err(e)) => debug!("close frame not sent: {e}"),
        Err(_) => debug!("close frame timed out"),
    }
}
