//! The `transport` module connects real websocket clients to the hub.
//!
//! It provides [`websocket::WsConnection`], the websocket implementation of
//! [`Connection`](crate::connection::Connection), and the server loop that
//! registers every accepted socket as a [`TopicPeer`](crate::hub::TopicPeer).

pub mod message;
pub mod websocket;

pub use message::ClientMessage;
pub use websocket::{WsConnection, serve, start_websocket_server};
