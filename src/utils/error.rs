//! The `error` module defines the error types used within `wshub`.
//!
//! Connection implementations report failures as [`ConnectionError`]. The hub
//! wraps those into [`HubError`] together with the id of the connection that
//! failed before handing them to the configured error handler.

use std::str::Utf8Error;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Failure reported by a [`Connection`](crate::connection::Connection).
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,

    #[error("text payload is not valid utf-8: {0}")]
    InvalidText(#[from] FromUtf8Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors produced by the broadcast hub.
///
/// Only `Encoding`, `InvalidPayload` and `Stopped` are ever returned to a
/// caller. The connection variants are routed to the hub's error handler.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to encode event payload: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("payload for topic {topic:?} is not valid utf-8: {source}")]
    InvalidPayload {
        topic: String,
        #[source]
        source: Utf8Error,
    },

    #[error("write to connection {id} failed: {source}")]
    ConnectionWrite {
        id: String,
        #[source]
        source: ConnectionError,
    },

    #[error("closing connection {id} failed: {source}")]
    ConnectionClose {
        id: String,
        #[source]
        source: ConnectionError,
    },

    #[error("broadcast hub is not running")]
    Stopped,
}
