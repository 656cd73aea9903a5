//! Broadcast hub engine
//!
//! The hub owns the table of connected peers and fans events out to them.
//!
//! Concurrency notes:
//! - All table mutations happen inside one control-loop task. Callers talk to
//!   it through channels (register, unregister, broadcast, count), so the
//!   table needs no lock.
//! - The loop never awaits connection I/O. Each broadcast spawns one delivery
//!   task per registered peer, and closes on unregister are spawned as well,
//!   so a slow peer delays neither other peers nor the next request.
//! - A failed write tears the peer down and re-enters the loop through the
//!   same unregister queue external callers use.
//! - Delivery tasks hold only a weak handle to the unregister queue. The loop
//!   stops once every `BroadcastHub` clone has been dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::{self, WeakSender};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

use crate::connection::{Connection, MessageKind};
use crate::hub::event::Event;
use crate::hub::peer::{Peer, PeerRequest};
use crate::utils::error::HubError;

/// Callback receiving every error the hub catches internally.
pub type ErrorHandler = Arc<dyn Fn(&HubError) + Send + Sync>;

/// Default error handler: logs the error and carries on.
pub fn log_error(err: &HubError) {
    warn!(error = %err, "broadcast hub error");
}

/// Hub construction options.
#[derive(Clone)]
pub struct HubConfig {
    /// Receives connection write/close failures and `try_broadcast_json`
    /// encoding failures.
    pub error_handler: ErrorHandler,

    /// Close connections passed to `unregister` even when they are not in
    /// the peer table.
    pub close_unknown: bool,

    /// Capacity of the broadcast and unregister queues. Zero is treated as one.
    pub inbox_capacity: usize,
}

impl HubConfig {
    pub const DEFAULT_INBOX_CAPACITY: usize = 64;

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HubError) + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            error_handler: Arc::new(log_error),
            close_unknown: true,
            inbox_capacity: Self::DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConfig")
            .field("close_unknown", &self.close_unknown)
            .field("inbox_capacity", &self.inbox_capacity)
            .finish_non_exhaustive()
    }
}

struct Registration {
    request: PeerRequest,
    accepted: oneshot::Sender<()>,
}

struct Unregistration {
    connection: Arc<dyn Connection>,
    done: Option<oneshot::Sender<()>>,
}

/// Receiving ends of the hub queues. Taken exactly once by `run`.
struct Inbox {
    register: mpsc::Receiver<Registration>,
    unregister: mpsc::Receiver<Unregistration>,
    broadcast: mpsc::Receiver<Arc<Event>>,
    count: mpsc::Receiver<oneshot::Sender<usize>>,
}

struct Shared {
    register: mpsc::Sender<Registration>,
    unregister: mpsc::Sender<Unregistration>,
    broadcast: mpsc::Sender<Arc<Event>>,
    count: mpsc::Sender<oneshot::Sender<usize>>,
    inbox: Mutex<Option<Inbox>>,
    config: HubConfig,
}

/// In-process publish/subscribe hub multiplexing events to many peers.
///
/// Cloning is cheap; all clones drive the same control loop.
#[derive(Clone)]
pub struct BroadcastHub {
    shared: Arc<Shared>,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        let capacity = config.inbox_capacity.max(1);
        let (register, register_rx) = mpsc::channel(1);
        let (unregister, unregister_rx) = mpsc::channel(capacity);
        let (broadcast, broadcast_rx) = mpsc::channel(capacity);
        let (count, count_rx) = mpsc::channel(1);

        let inbox = Inbox {
            register: register_rx,
            unregister: unregister_rx,
            broadcast: broadcast_rx,
            count: count_rx,
        };

        Self {
            shared: Arc::new(Shared {
                register,
                unregister,
                broadcast,
                count,
                inbox: Mutex::new(Some(inbox)),
                config,
            }),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.shared.config
    }

    /// Spawns the control loop on the current tokio runtime.
    ///
    /// Only the first successful call has an effect; later calls return
    /// immediately. Outside a runtime nothing is started and the hub can
    /// still be run later from inside one.
    pub fn run(&self) {
        let Ok(runtime) = Handle::try_current() else {
            error!("broadcast hub not started: no tokio runtime in this context");
            return;
        };

        let inbox = self
            .shared
            .inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(inbox) = inbox else {
            return;
        };

        let control = ControlLoop {
            peers: HashMap::new(),
            config: self.shared.config.clone(),
            requeue: self.shared.unregister.downgrade(),
        };
        runtime.spawn(control.run(inbox));
        info!("broadcast hub started");
    }

    /// Whether `run` has been called.
    pub fn is_running(&self) -> bool {
        self.shared
            .inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Adds a peer, replacing any entry with the same connection id.
    ///
    /// Returns once the control loop has inserted it, so every broadcast
    /// dequeued afterwards sees the peer. Waits indefinitely if the hub was
    /// never started.
    pub async fn register(&self, request: PeerRequest) -> Result<(), HubError> {
        let (accepted, ack) = oneshot::channel();
        self.shared
            .register
            .send(Registration { request, accepted })
            .await
            .map_err(|_| HubError::Stopped)?;
        ack.await.map_err(|_| HubError::Stopped)
    }

    /// Removes the peer for `connection` and closes the connection.
    ///
    /// Returns once the entry is gone from the table. The close itself runs
    /// in the background; its failure is reported to the error handler.
    pub async fn unregister(&self, connection: Arc<dyn Connection>) -> Result<(), HubError> {
        let (done, ack) = oneshot::channel();
        self.shared
            .unregister
            .send(Unregistration {
                connection,
                done: Some(done),
            })
            .await
            .map_err(|_| HubError::Stopped)?;
        ack.await.map_err(|_| HubError::Stopped)
    }

    /// Queues `event` for fan-out to every matching peer.
    ///
    /// Returns when the loop inbox has accepted the event, not when delivery
    /// finished. Per-peer failures are never reported here. Payloads go out
    /// as text frames, so one that is not UTF-8 is rejected before queueing.
    pub async fn broadcast(&self, event: Event) -> Result<(), HubError> {
        if let Err(source) = std::str::from_utf8(event.payload()) {
            return Err(HubError::InvalidPayload {
                topic: event.topic().to_string(),
                source,
            });
        }

        self.shared
            .broadcast
            .send(Arc::new(event))
            .await
            .map_err(|_| HubError::Stopped)
    }

    /// Serializes `value` to JSON and broadcasts it on `topic`.
    pub async fn broadcast_json<T>(&self, topic: &str, value: &T) -> Result<(), HubError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(value)?;
        self.broadcast(Event::new(topic, payload)).await
    }

    /// Like [`broadcast_json`](Self::broadcast_json) but hands any error to
    /// the error handler.
    pub async fn try_broadcast_json<T>(&self, topic: &str, value: &T)
    where
        T: Serialize + ?Sized,
    {
        if let Err(err) = self.broadcast_json(topic, value).await {
            (self.shared.config.error_handler)(&err);
        }
    }

    /// Number of registered peers, as seen by the control loop.
    pub async fn count_peers(&self) -> Result<usize, HubError> {
        let (reply, answer) = oneshot::channel();
        self.shared
            .count
            .send(reply)
            .await
            .map_err(|_| HubError::Stopped)?;
        answer.await.map_err(|_| HubError::Stopped)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("running", &self.is_running())
            .field("config", &self.shared.config)
            .finish()
    }
}

struct Entry {
    connection: Arc<dyn Connection>,
    peer: Arc<dyn Peer>,
}

/// State owned by the control-loop task.
struct ControlLoop {
    peers: HashMap<String, Entry>,
    config: HubConfig,
    requeue: WeakSender<Unregistration>,
}

impl ControlLoop {
    async fn run(mut self, mut inbox: Inbox) {
        loop {
            tokio::select! {
                Some(registration) = inbox.register.recv() => self.register(registration),
                Some(unregistration) = inbox.unregister.recv() => self.unregister(unregistration),
                Some(event) = inbox.broadcast.recv() => self.dispatch(event),
                Some(reply) = inbox.count.recv() => {
                    let _ = reply.send(self.peers.len());
                }
                else => break,
            }
        }
        info!(peers = self.peers.len(), "broadcast hub stopped");
    }

    fn register(&mut self, registration: Registration) {
        let Registration { request, accepted } = registration;
        let id = request.connection.id().to_string();
        let replaced = self
            .peers
            .insert(
                id.clone(),
                Entry {
                    connection: request.connection,
                    peer: request.peer,
                },
            )
            .is_some();
        debug!(connection = %id, replaced, peers = self.peers.len(), "peer registered");
        let _ = accepted.send(());
    }

    fn unregister(&mut self, unregistration: Unregistration) {
        let Unregistration { connection, done } = unregistration;
        let id = connection.id().to_string();
        let known = self.peers.remove(&id).is_some();
        debug!(connection = %id, known, peers = self.peers.len(), "peer unregistered");

        if known || self.config.close_unknown {
            let on_error = self.config.error_handler.clone();
            tokio::spawn(async move {
                if let Err(source) = connection.close().await {
                    on_error(&HubError::ConnectionClose { id, source });
                }
            });
        }

        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    fn dispatch(&self, event: Arc<Event>) {
        trace!(topic = event.topic(), peers = self.peers.len(), "dispatching event");
        for entry in self.peers.values() {
            tokio::spawn(deliver(
                event.clone(),
                entry.connection.clone(),
                entry.peer.clone(),
                self.config.error_handler.clone(),
                self.requeue.clone(),
            ));
        }
    }
}

/// Writes one event to one peer, tearing the peer down if the write fails.
async fn deliver(
    event: Arc<Event>,
    connection: Arc<dyn Connection>,
    peer: Arc<dyn Peer>,
    on_error: ErrorHandler,
    requeue: WeakSender<Unregistration>,
) {
    let mut guard = peer.base().lock().await;
    if guard.is_closing() || !peer.matches(event.topic()) {
        return;
    }

    let Err(source) = connection
        .write_message(MessageKind::Text, event.payload())
        .await
    else {
        return;
    };

    let id = connection.id().to_string();
    on_error(&HubError::ConnectionWrite {
        id: id.clone(),
        source,
    });
    guard.start_closing();

    if let Err(source) = connection.write_message(MessageKind::Close, &[]).await {
        on_error(&HubError::ConnectionWrite {
            id: id.clone(),
            source,
        });
    }
    if let Err(source) = connection.close().await {
        on_error(&HubError::ConnectionClose {
            id: id.clone(),
            source,
        });
    }

    if let Some(unregister) = requeue.upgrade() {
        let _ = unregister
            .send(Unregistration {
                connection,
                done: None,
            })
            .await;
    } else {
        debug!(connection = %id, "hub stopped before failed peer could be unregistered");
    }
}
