//! In-memory `Connection` used by the hub and transport tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{Connection, MessageKind};
use crate::utils::error::ConnectionError;

/// Records every frame written to it. Writes fail once `fail_writes` is set.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    id: String,
    frames: Mutex<Vec<(MessageKind, Vec<u8>)>>,
    fail_writes: AtomicBool,
    fail_close: AtomicBool,
    closes: AtomicUsize,
    write_delay: Option<Duration>,
}

impl RecordingConnection {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn slow(id: &str, delay: Duration) -> Self {
        Self {
            id: id.to_string(),
            write_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn failing(id: &str) -> Self {
        let conn = Self::new(id);
        conn.fail_writes.store(true, Ordering::SeqCst);
        conn
    }

    /// Fails every write, each after `delay`.
    pub fn slow_failing(id: &str, delay: Duration) -> Self {
        let conn = Self::slow(id, delay);
        conn.fail_writes.store(true, Ordering::SeqCst);
        conn
    }

    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<(MessageKind, Vec<u8>)> {
        self.frames.lock().unwrap().clone()
    }

    /// Payloads of successfully written text frames.
    pub fn texts(&self) -> Vec<String> {
        self.frames()
            .into_iter()
            .filter(|(kind, _)| *kind == MessageKind::Text)
            .map(|(_, payload)| String::from_utf8(payload).unwrap())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write_message(
        &self,
        kind: MessageKind,
        payload: &[u8],
    ) -> Result<(), ConnectionError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectionError::Other("broken pipe".to_string()));
        }
        self.frames.lock().unwrap().push((kind, payload.to_vec()));
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }
        Ok(())
    }
}

#[tokio::test]
async fn recording_connection_keeps_frames_in_order() {
    let conn = RecordingConnection::new("c1");
    conn.write_message(MessageKind::Text, b"one").await.unwrap();
    conn.write_message(MessageKind::Text, b"two").await.unwrap();
    conn.write_message(MessageKind::Close, b"").await.unwrap();

    assert_eq!(conn.id(), "c1");
    assert_eq!(conn.texts(), vec!["one", "two"]);
    assert_eq!(conn.frames().len(), 3);
}

#[tokio::test]
async fn failing_connection_rejects_writes() {
    let conn = RecordingConnection::failing("c2");
    let err = conn.write_message(MessageKind::Text, b"x").await.unwrap_err();
    assert!(matches!(err, ConnectionError::Other(_)));
    assert!(conn.frames().is_empty());
}
