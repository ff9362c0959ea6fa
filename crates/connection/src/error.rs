//! Error types for the connection layer.
//!
//! None of these cross the [`ConnectionManager`](crate::ConnectionManager)
//! boundary: failures are logged and folded into state transitions. They
//! are public so custom [`Connector`](crate::Connector) implementations
//! can report why a transport could not be opened.

use tokio_tungstenite::tungstenite;

use crate::endpoint::EndpointError;

/// Errors produced while opening or driving a transport.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("connection closed")]
    Closed,

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}
