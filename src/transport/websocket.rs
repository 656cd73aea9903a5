//! WebSocket transport
//!
//! Responsibilities:
//! - accept TCP connections and perform the websocket handshake
//! - wrap the write half in a `WsConnection` and register it with the hub
//!   together with a `TopicPeer` seeded from the configured default topics
//! - apply `subscribe`/`unsubscribe` frames to that peer
//! - unregister the connection once the client goes away
//!
//! All writes to a client go through the hub; this module only reads.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::config::HubSettings;
use crate::connection::{Connection, MessageKind};
use crate::hub::{BroadcastHub, PeerRequest, TopicPeer};
use crate::transport::message::ClientMessage;
use crate::utils::error::ConnectionError;

/// Write half of a websocket, usable as a hub [`Connection`].
pub struct WsConnection<S> {
    id: String,
    sink: Mutex<SplitSink<WebSocketStream<S>, WsMessage>>,
}

impl<S> WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(sink: SplitSink<WebSocketStream<S>, WsMessage>) -> Self {
        Self {
            id: format!("conn-{}", Uuid::new_v4()),
            sink: Mutex::new(sink),
        }
    }
}

impl<S> std::fmt::Debug for WsConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

fn map_ws_error(err: tungstenite::Error) -> ConnectionError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ConnectionError::Closed
        }
        other => ConnectionError::WebSocket(other),
    }
}

#[async_trait]
impl<S> Connection for WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn write_message(
        &self,
        kind: MessageKind,
        payload: &[u8],
    ) -> Result<(), ConnectionError> {
        let message = match kind {
            MessageKind::Text => WsMessage::text(String::from_utf8(payload.to_vec())?),
            MessageKind::Close => WsMessage::Close(None),
        };
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(map_ws_error)
    }

    /// Closing an already closed socket succeeds.
    async fn close(&self) -> Result<(), ConnectionError> {
        match self.sink.lock().await.close().await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(other) => Err(ConnectionError::WebSocket(other)),
        }
    }
}

/// Binds `addr` and serves websocket clients until an accept error occurs.
pub async fn start_websocket_server(
    addr: String,
    hub: BroadcastHub,
    settings: HubSettings,
) -> io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "websocket server listening");
    serve(listener, hub, settings).await
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    hub: BroadcastHub,
    settings: HubSettings,
) -> io::Result<()> {
    let active = Arc::new(AtomicUsize::new(0));

    loop {
        let (stream, remote) = listener.accept().await?;

        if active.load(Ordering::SeqCst) >= settings.max_connections {
            warn!(%remote, limit = settings.max_connections, "connection limit reached, dropping client");
            drop(stream);
            continue;
        }
        active.fetch_add(1, Ordering::SeqCst);

        let hub = hub.clone();
        let topics = settings.default_topics.clone();
        let active = active.clone();
        tokio::spawn(async move {
            handle_connection(stream, hub, topics).await;
            active.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

async fn handle_connection(stream: TcpStream, hub: BroadcastHub, topics: Vec<String>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "websocket handshake failed");
            return;
        }
    };

    let (sink, mut receiver) = ws_stream.split();
    let connection = Arc::new(WsConnection::new(sink));
    let peer = Arc::new(TopicPeer::new(topics));
    let id = connection.id().to_string();

    if let Err(e) = hub
        .register(PeerRequest::new(connection.clone(), peer.clone()))
        .await
    {
        warn!(connection = %id, error = %e, "failed to register peer");
        return;
    }
    info!(connection = %id, topics = ?peer.topics(), "peer connected");

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => apply_client_message(&peer, &id, text.as_str()),
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = %id, error = %e, "read failed");
                break;
            }
        }
    }

    if let Err(e) = hub.unregister(connection).await {
        warn!(connection = %id, error = %e, "failed to unregister peer");
    }
    info!(connection = %id, "peer disconnected");
}

/// Applies one client control frame to `peer`. Invalid frames are logged.
pub(crate) fn apply_client_message(peer: &TopicPeer, id: &str, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { topic }) => {
            peer.subscribe(&topic);
            debug!(connection = %id, %topic, "subscribed");
        }
        Ok(ClientMessage::Unsubscribe { topic }) => {
            peer.unsubscribe(&topic);
            debug!(connection = %id, %topic, "unsubscribed");
        }
        Err(err) => {
            warn!(
                connection = %id,
                error = %err,
                frame = %text.chars().take(100).collect::<String>(),
                "invalid client message"
            );
        }
    }
}
