//! The `hub` module contains the broadcast hub: the peer table, its control
//! loop and the concurrent fan-out of events to matching peers.

pub mod engine;
pub mod event;
pub mod peer;

pub use engine::{BroadcastHub, ErrorHandler, HubConfig};
pub use event::Event;
pub use peer::{BasePeer, Peer, PeerGuard, PeerRequest, TopicPeer};
