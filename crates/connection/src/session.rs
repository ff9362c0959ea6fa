//! One live transport handle and the tasks that drive it.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ConnectionError;
use crate::observer::Observers;
use crate::pumps::Outbound;
use crate::transport::{Frame, TransportChannel};
use crate::types::{ConnectionConfig, WRITE_QUEUE_SIZE};

/// A connected transport plus its read, write and keepalive pumps.
///
/// Sessions are never reused: each successful connection attempt builds a
/// new one and the previous one is closed first.
pub(crate) struct Session {
    writer: SessionWriter,
    cancel: CancellationToken,
    read_handle: JoinHandle<()>,
    write_handle: JoinHandle<()>,
    ping_handle: Option<JoinHandle<()>>,
}

impl Session {
    /// Spawns the pumps for `channel`. `scope` is the manager's shutdown
    /// token; the session token is a child of it.
    pub(crate) fn start(
        channel: TransportChannel,
        observers: Arc<Observers>,
        config: &ConnectionConfig,
        scope: &CancellationToken,
    ) -> Self {
        let TransportChannel { sink, stream } = channel;
        let cancel = scope.child_token();
        let (write_tx, write_rx) = mpsc::channel::<Outbound>(WRITE_QUEUE_SIZE);

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            sink,
            write_rx,
            cancel.clone(),
            config.close_timeout(),
        ));

        let read_handle = tokio::spawn(crate::pumps::read::read_pump(
            stream,
            observers,
            write_tx.clone(),
            cancel.clone(),
        ));

        let ping_handle = config.ping_interval().map(|period| {
            tokio::spawn(crate::pumps::ping::ping_pump(
                write_tx.clone(),
                period,
                cancel.clone(),
            ))
        });

        Self {
            writer: SessionWriter { tx: write_tx },
            cancel,
            read_handle,
            write_handle,
            ping_handle,
        }
    }

    pub(crate) fn writer(&self) -> SessionWriter {
        self.writer.clone()
    }

    /// Resolves once the session has ended: peer close, read or write
    /// failure, or shutdown of the owning manager.
    pub(crate) async fn lost(&self) {
        self.cancel.cancelled().await;
    }

    /// Stops the pumps and waits for them, including the bounded close
    /// handshake in the write pump.
    pub(crate) async fn close(&mut self) {
        self.cancel.cancel();
        let _ = (&mut self.write_handle).await;
        let _ = (&mut self.read_handle).await;
        if let Some(handle) = self.ping_handle.as_mut() {
            let _ = handle.await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.read_handle.abort();
        self.write_handle.abort();
        if let Some(handle) = &self.ping_handle {
            handle.abort();
        }
    }
}

/// Cloneable handle for queueing frames on a session's write pump.
#[derive(Clone)]
pub(crate) struct SessionWriter {
    tx: mpsc::Sender<Outbound>,
}

impl SessionWriter {
    /// Queues `frame` and waits until it has been written and flushed.
    pub(crate) async fn write(&self, frame: Frame) -> Result<(), ConnectionError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Outbound {
                frame,
                done: Some(done_tx),
            })
            .await
            .map_err(|_| ConnectionError::Closed)?;

        match done_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            // Pump stopped before reaching the frame.
            Err(_) => Err(ConnectionError::Closed),
        }
    }
}
