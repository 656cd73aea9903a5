//! Event definition
//!
//! An `Event` is the unit the hub fans out: a topic used for routing and the
//! raw payload written as a text frame to every matching peer. Events are
//! immutable once built and shared between fan-out tasks behind an `Arc`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    topic: String,
    payload: Vec<u8>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
