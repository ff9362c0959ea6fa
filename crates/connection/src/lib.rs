//! Resilient WebSocket connection for the Taskboard live channel.
//!
//! A [`ConnectionManager`] keeps one persistent connection to a fixed
//! endpoint, reconnects after a fixed delay whenever it drops, delivers
//! inbound text messages to observers in order and serializes outbound
//! writes.

pub mod endpoint;
pub mod error;
pub mod manager;
pub mod observer;
mod pumps;
pub(crate) mod reconnection;
mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use endpoint::{Endpoint, EndpointError, Scheme};
pub use error::ConnectionError;
pub use manager::ConnectionManager;
pub use observer::{ChannelObserver, ConnectionObserver, SubscriptionId};
pub use transport::{
    ConnectFuture, Connector, Frame, FrameSink, FrameStream, TransportChannel, WsConnector,
};
pub use types::{ConnectionConfig, ConnectionEvent, ConnectionState, ReconnectPolicy};
