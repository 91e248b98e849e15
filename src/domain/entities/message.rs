use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{ChatTransferEvent, ChatType, ConversationId, MessageId, UserId};

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Persisted chat log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Store-assigned identifier; blank until persisted.
    #[serde(default)]
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub send_id: UserId,
    /// Peer for direct chats, group id for group chats.
    pub recv_id: UserId,
    pub chat_type: ChatType,
    pub message_type: u32,
    pub content: String,
    pub send_time: i64,
    /// Serialized [`ReadBitmap`](super::ReadBitmap) bytes.
    #[serde(default)]
    pub read_records: Vec<u8>,
}

impl ChatMessage {
    /// Builds the record for an inbound chat event.
    #[must_use]
    pub fn from_event(event: &ChatTransferEvent) -> Self {
        Self {
            id: MessageId::default(),
            conversation_id: event.conversation_id.clone(),
            send_id: event.send_id.clone(),
            recv_id: event.recv_id.clone(),
            chat_type: event.chat_type,
            message_type: event.message_type,
            content: event.content.clone(),
            send_time: event.send_time,
            read_records: Vec::new(),
        }
    }

    /// Returns a copy carrying the store-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }
}
