//! # wshub
//!
//! `wshub` is an in-process broadcast hub that multiplexes one event stream to
//! many concurrently connected peers, typically websocket clients.
//!
//! ## Core Modules
//!
//! - `hub`: the broadcast hub, its peer table, control loop and fan-out.
//! - `connection`: the capability set the hub needs from a client connection.
//! - `transport`: websocket implementation of a connection and the server
//!   that registers accepted sockets as peers.
//! - `config`: loads server, hub and logging settings.
//! - `utils`: error types, logging setup and shutdown signals.

pub mod config;
pub mod connection;
pub mod hub;
pub mod transport;
pub mod utils;

pub use connection::{Connection, MessageKind};
pub use hub::{BasePeer, BroadcastHub, Event, HubConfig, Peer, PeerRequest, TopicPeer};
pub use utils::error::{ConnectionError, HubError};

#[cfg(test)]
mod tests;
