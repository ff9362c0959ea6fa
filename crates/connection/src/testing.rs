//! Scripted in-memory transport for exercising the manager.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{sink, stream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite;

use crate::endpoint::Endpoint;
use crate::error::ConnectionError;
use crate::transport::{ConnectFuture, Connector, Frame, TransportChannel};
use crate::types::{ConnectionConfig, ConnectionEvent};

/// Outcome of one scripted connection attempt.
pub(crate) enum Attempt {
    Accept,
    Fail,
    /// Never completes; only a timeout or shutdown ends it.
    Hang,
}

/// Connector that plays back a list of attempt outcomes. Attempts past the
/// end of the script fail.
pub(crate) struct ScriptedConnector {
    script: Mutex<VecDeque<Attempt>>,
    opened_at: Mutex<Vec<Instant>>,
    peers_tx: mpsc::UnboundedSender<Peer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Peer>>,
}

impl ScriptedConnector {
    pub(crate) fn new(script: Vec<Attempt>) -> Arc<Self> {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            script: Mutex::new(script.into()),
            opened_at: Mutex::new(Vec::new()),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        })
    }

    pub(crate) fn attempts(&self) -> usize {
        self.opened_at.lock().unwrap().len()
    }

    pub(crate) fn opened_at(&self) -> Vec<Instant> {
        self.opened_at.lock().unwrap().clone()
    }

    /// The remote side of the next accepted attempt.
    pub(crate) async fn next_peer(&self) -> Peer {
        self.peers_rx
            .lock()
            .await
            .recv()
            .await
            .expect("connector dropped")
    }
}

impl Connector for ScriptedConnector {
    fn open<'a>(
        &'a self,
        _endpoint: &'a Endpoint,
        _config: &'a ConnectionConfig,
    ) -> ConnectFuture<'a> {
        self.opened_at.lock().unwrap().push(Instant::now());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Attempt::Fail);

        Box::pin(async move {
            match next {
                Attempt::Accept => {
                    let (channel, peer) = pipe();
                    let _ = self.peers_tx.send(peer);
                    Ok(channel)
                }
                Attempt::Fail => Err(ConnectionError::Ws(tungstenite::Error::Io(
                    io::Error::new(io::ErrorKind::ConnectionRefused, "scripted refusal"),
                ))),
                Attempt::Hang => std::future::pending().await,
            }
        })
    }
}

/// Remote end of an in-memory transport.
pub(crate) struct Peer {
    to_client: mpsc::UnboundedSender<Result<Frame, tungstenite::Error>>,
    from_client: Option<mpsc::UnboundedReceiver<Frame>>,
}

impl Peer {
    pub(crate) fn push_text(&self, text: &str) {
        let _ = self.to_client.send(Ok(Frame::text(text)));
    }

    pub(crate) fn close(&self) {
        let _ = self.to_client.send(Ok(Frame::Close(None)));
    }

    /// Makes every further client write fail.
    pub(crate) fn stop_reading(&mut self) {
        self.from_client = None;
    }

    /// Text frames written by the client so far.
    pub(crate) fn sent_texts(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(rx) = self.from_client.as_mut() {
            while let Ok(frame) = rx.try_recv() {
                if let Frame::Text(t) = frame {
                    out.push(t.as_str().to_string());
                }
            }
        }
        out
    }
}

fn pipe() -> (TransportChannel, Peer) {
    let (to_client, client_rx) = mpsc::unbounded_channel::<Result<Frame, tungstenite::Error>>();
    let (client_tx, from_client) = mpsc::unbounded_channel::<Frame>();

    let stream = stream::unfold(client_rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    let sink = sink::unfold(client_tx, |tx, frame: Frame| async move {
        tx.send(frame)
            .map_err(|_| tungstenite::Error::ConnectionClosed)?;
        Ok::<_, tungstenite::Error>(tx)
    });

    (
        TransportChannel::new(Box::pin(sink), Box::pin(stream)),
        Peer {
            to_client,
            from_client: Some(from_client),
        },
    )
}

/// Config with keepalive disabled so paused-clock tests only see the
/// timers they set up.
pub(crate) fn quiet_config() -> ConnectionConfig {
    ConnectionConfig {
        ping_interval_ms: 0,
        ..Default::default()
    }
}

/// Waits for the next connected/not-connected flip.
pub(crate) async fn next_connection_change(rx: &mut mpsc::Receiver<ConnectionEvent>) -> bool {
    let wait = async {
        loop {
            match rx.recv().await {
                Some(ConnectionEvent::ConnectionChanged { connected }) => return connected,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(600), wait)
        .await
        .expect("timed out waiting for a connection change")
}
