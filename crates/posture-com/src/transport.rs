use crate::ComError;

/// Message channel to the one connected stream client.
///
/// Carries UTF-8 control text and binary frame payloads. Once the peer is
/// gone every send fails with `ComError::ConnectionClosed`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send_text(&mut self, text: &str) -> Result<(), ComError>;

    async fn send_binary(&mut self, payload: Vec<u8>) -> Result<(), ComError>;

    /// Resolves once the peer has disconnected. Never resolves while it is connected.
    async fn closed(&mut self);

    fn is_closed(&self) -> bool;
}
