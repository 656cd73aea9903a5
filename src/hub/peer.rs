//! Peer state
//!
//! A peer is the subscriber-side state attached to one connection. Every peer
//! composes a [`BasePeer`], which owns the per-peer guard and the one-way
//! closing flag, and adds its own topic predicate through [`Peer::matches`].
//!
//! The guard is an async mutex because the hub holds it across the
//! connection write. Holding it is what serializes writes to one connection.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, MutexGuard};

use crate::connection::Connection;

/// Capability set the hub needs from a peer.
pub trait Peer: Send + Sync {
    /// Guard and closing flag shared by every peer type.
    fn base(&self) -> &BasePeer;

    /// Whether this peer should receive events published on `topic`.
    fn matches(&self, topic: &str) -> bool;
}

#[derive(Debug, Default)]
struct PeerState {
    closing: bool,
}

/// Reusable guard + closing flag. Compose it into concrete peer types.
#[derive(Debug, Default)]
pub struct BasePeer {
    state: Mutex<PeerState>,
}

impl BasePeer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the peer guard. Released when the returned guard drops.
    pub async fn lock(&self) -> PeerGuard<'_> {
        PeerGuard {
            state: self.state.lock().await,
        }
    }

    /// Reads the closing flag under the guard.
    pub async fn is_closing(&self) -> bool {
        self.lock().await.is_closing()
    }
}

/// Exclusive access to a peer's state.
pub struct PeerGuard<'a> {
    state: MutexGuard<'a, PeerState>,
}

impl PeerGuard<'_> {
    pub fn is_closing(&self) -> bool {
        self.state.closing
    }

    /// Marks the peer as closing. Idempotent; the flag is never reset.
    pub fn start_closing(&mut self) {
        self.state.closing = true;
    }
}

impl fmt::Debug for PeerGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerGuard")
            .field("closing", &self.state.closing)
            .finish()
    }
}

/// Wildcard subscription matching every topic.
pub const ALL_TOPICS: &str = "*";

/// Peer subscribed to an explicit, mutable set of topics.
///
/// `matches` is true when the set contains the topic or [`ALL_TOPICS`].
#[derive(Debug, Default)]
pub struct TopicPeer {
    base: BasePeer,
    topics: RwLock<HashSet<String>>,
}

impl TopicPeer {
    pub fn new<I, T>(topics: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            base: BasePeer::new(),
            topics: RwLock::new(topics.into_iter().map(Into::into).collect()),
        }
    }

    /// Adds a topic. Duplicate subscriptions are ignored.
    pub fn subscribe(&self, topic: &str) {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string());
    }

    pub fn unsubscribe(&self, topic: &str) {
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic);
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<_> = self
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        topics.sort();
        topics
    }
}

impl Peer for TopicPeer {
    fn base(&self) -> &BasePeer {
        &self.base
    }

    fn matches(&self, topic: &str) -> bool {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.contains(ALL_TOPICS) || topics.contains(topic)
    }
}

/// A connection paired with its peer, submitted once to
/// [`BroadcastHub::register`](super::BroadcastHub::register).
#[derive(Clone)]
pub struct PeerRequest {
    pub connection: Arc<dyn Connection>,
    pub peer: Arc<dyn Peer>,
}

impl PeerRequest {
    pub fn new(connection: Arc<dyn Connection>, peer: Arc<dyn Peer>) -> Self {
        Self { connection, peer }
    }
}

impl fmt::Debug for PeerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerRequest")
            .field("connection", &self.connection.id())
            .finish_non_exhaustive()
    }
}
