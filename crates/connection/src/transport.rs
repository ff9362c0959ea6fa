//! Transport seam between the manager and the wire.
//!
//! A [`Connector`] opens one [`TransportChannel`] per connection attempt.
//! [`WsConnector`] is the production implementation over
//! `tokio-tungstenite`; tests plug in scripted connectors.

use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::ConnectionError;
use crate::types::ConnectionConfig;

/// One discrete unit read from or written to the transport.
pub type Frame = tungstenite::Message;

/// Write half of an opened transport.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = tungstenite::Error> + Send>>;

/// Read half of an opened transport.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, tungstenite::Error>> + Send>>;

/// A boxed future returned by [`Connector::open`].
pub type ConnectFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransportChannel, ConnectionError>> + Send + 'a>>;

/// An opened full-duplex transport handle, already split into halves.
pub struct TransportChannel {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl TransportChannel {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Opens transport handles.
///
/// Called once per connection attempt. The manager bounds each call with
/// the configured connect timeout and drops the future on shutdown, so
/// implementations need not handle either themselves.
pub trait Connector: Send + Sync + 'static {
    fn open<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        config: &'a ConnectionConfig,
    ) -> ConnectFuture<'a>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        config: &'a ConnectionConfig,
    ) -> ConnectFuture<'a> {
        Box::pin(async move {
            let mut ws_config = WebSocketConfig::default();
            ws_config.max_message_size = Some(config.max_message_size);
            ws_config.max_frame_size = Some(config.max_message_size);

            let url = endpoint.url();
            let (ws_stream, response) =
                tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false)
                    .await?;
            debug!(url = %url, status = %response.status(), "WebSocket handshake complete");

            let (write, read) = ws_stream.split();
            Ok::<_, ConnectionError>(TransportChannel::new(Box::pin(write), Box::pin(read)))
        })
    }
}
