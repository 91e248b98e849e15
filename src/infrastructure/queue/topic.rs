//! Queue topics and message envelopes.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Topic carrying new chat messages.
pub const CHAT_TRANSFER_TOPIC: &str = "msg_chat_transfer";
/// Topic carrying mark-read events.
pub const READ_TRANSFER_TOPIC: &str = "msg_read_transfer";

/// A queue topic this service consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// New chat messages.
    ChatTransfer,
    /// Mark-read events.
    ReadTransfer,
}

impl Topic {
    /// Wire name of the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChatTransfer => CHAT_TRANSFER_TOPIC,
            Self::ReadTransfer => READ_TRANSFER_TOPIC,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            CHAT_TRANSFER_TOPIC => Ok(Self::ChatTransfer),
            READ_TRANSFER_TOPIC => Ok(Self::ReadTransfer),
            other => Err(format!("unknown topic '{other}'")),
        }
    }
}

/// One inbound line: `{"topic": ..., "key": ..., "value": ...}`.
#[derive(Debug, Deserialize)]
pub struct QueueEnvelope {
    /// Topic name.
    pub topic: String,
    /// Message key, used for log context.
    #[serde(default)]
    pub key: String,
    /// Event body, either inline JSON or a JSON-encoded string.
    pub value: serde_json::Value,
}

/// A message handed to a topic consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Message key.
    pub key: String,
    /// Raw event JSON.
    pub value: String,
}

impl From<QueueEnvelope> for QueueMessage {
    fn from(envelope: QueueEnvelope) -> Self {
        let value = match envelope.value {
            serde_json::Value::String(encoded) => encoded,
            inline => inline.to_string(),
        };
        Self {
            key: envelope.key,
            value,
        }
    }
}
