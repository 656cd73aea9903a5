//! Client control protocol
//!
//! Clients never publish through the websocket; they only adjust which topics
//! their peer matches. Frames are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "subscribe", "topic": "news"}
//! {"type": "unsubscribe", "topic": "news"}
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String },
}
