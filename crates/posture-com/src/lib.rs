//! Network plumbing for the live stream: the [`Transport`] seam the pump
//! writes to and its single-client websocket implementation.

pub mod error;
pub mod transport;
pub mod ws;

pub use error::ComError;
pub use transport::Transport;
pub use ws::{BUSY_MESSAGE, HANDSHAKE_TIMEOUT, WsListener, WsTransport};
