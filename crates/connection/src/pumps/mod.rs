//! Per-session tasks: receive loop, single writer, keepalive.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;

use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite;

use crate::transport::Frame;

/// A frame queued for the write pump.
///
/// `done` is `None` for control frames (pings, pongs) whose outcome
/// nobody waits on.
pub(crate) struct Outbound {
    pub(crate) frame: Frame,
    pub(crate) done: Option<oneshot::Sender<Result<(), tungstenite::Error>>>,
}

impl Outbound {
    pub(crate) fn control(frame: Frame) -> Self {
        Self { frame, done: None }
    }
}
