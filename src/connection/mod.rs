//! The `connection` module defines what the hub needs from a connected client.
//!
//! The hub never touches sockets directly. It only writes frames to, and
//! closes, values implementing [`Connection`]. The websocket implementation
//! lives in [`crate::transport::websocket`].

use async_trait::async_trait;

use crate::utils::error::ConnectionError;

/// Kind of frame written to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Close,
}

/// A bidirectional client connection.
///
/// `id` must be unique among live connections; the hub keys its peer table
/// by it. Writes to one connection are serialized by the caller (the hub
/// holds the peer guard while writing).
#[async_trait]
pub trait Connection: Send + Sync {
    /// Stable identity of this connection.
    fn id(&self) -> &str;

    /// Writes one frame. `Close` frames carry an empty payload.
    async fn write_message(
        &self,
        kind: MessageKind,
        payload: &[u8],
    ) -> Result<(), ConnectionError>;

    /// Closes the underlying transport.
    async fn close(&self) -> Result<(), ConnectionError>;
}

#[cfg(test)]
pub(crate) mod tests;
