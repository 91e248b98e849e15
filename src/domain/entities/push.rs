//! Outbound push payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatType, ConversationId, MarkReadEvent, MessageId, UserId, now_millis};

/// What a push carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// A new chat message.
    #[default]
    Chat,
    /// Updated read state for one or more messages.
    MarkRead,
}

/// Payload handed to the push-delivery layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct PushPayload {
    pub conversation_id: ConversationId,
    pub chat_type: ChatType,
    /// Blank for merged group read receipts.
    #[serde(default)]
    pub send_id: UserId,
    #[serde(default)]
    pub recv_id: UserId,
    #[serde(default)]
    pub recv_ids: Vec<UserId>,
    #[serde(default)]
    pub send_time: i64,
    #[serde(default)]
    pub content_type: ContentType,
    /// Message id to base64-encoded read bitmap.
    #[serde(default)]
    pub read_records: BTreeMap<MessageId, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl PushPayload {
    /// Push announcing a persisted chat message.
    #[must_use]
    pub fn chat(message: &ChatMessage) -> Self {
        Self {
            conversation_id: message.conversation_id.clone(),
            chat_type: message.chat_type,
            send_id: message.send_id.clone(),
            recv_id: message.recv_id.clone(),
            recv_ids: Vec::new(),
            send_time: message.send_time,
            content_type: ContentType::Chat,
            read_records: BTreeMap::new(),
            msg_id: (!message.id.is_empty()).then(|| message.id.clone()),
            message_type: Some(message.message_type),
            content: Some(message.content.clone()),
        }
    }

    /// Push carrying read-state snapshots for a mark-read event.
    #[must_use]
    pub fn mark_read(event: &MarkReadEvent, read_records: BTreeMap<MessageId, String>) -> Self {
        Self {
            conversation_id: event.conversation_id.clone(),
            chat_type: event.chat_type,
            send_id: event.send_id.clone(),
            recv_id: event.recv_id.clone(),
            recv_ids: Vec::new(),
            send_time: now_millis(),
            content_type: ContentType::MarkRead,
            read_records,
            msg_id: None,
            message_type: None,
            content: None,
        }
    }

    /// Empty group payload an idle aggregator emits so it can be retired.
    #[must_use]
    pub fn idle_notice(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            chat_type: ChatType::Group,
            send_id: UserId::default(),
            recv_id: UserId::default(),
            recv_ids: Vec::new(),
            send_time: 0,
            content_type: ContentType::MarkRead,
            read_records: BTreeMap::new(),
            msg_id: None,
            message_type: None,
            content: None,
        }
    }

    /// True if there is nothing to deliver.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recv_id.is_empty() && self.recv_ids.is_empty() && self.read_records.is_empty()
    }

    /// Unions `other`'s read records into this payload. Later snapshots
    /// replace earlier ones for the same message.
    pub fn merge_read_records(&mut self, other: BTreeMap<MessageId, String>) {
        self.read_records.extend(other);
    }
}

/// Frame kinds understood by the push-delivery layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Application data.
    #[default]
    Data,
}

/// Envelope sent to the push-delivery layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushFrame {
    /// Frame kind.
    pub frame_type: FrameType,
    /// Handler name on the receiving side.
    pub method: String,
    /// Identity of the originating system.
    pub form_id: UserId,
    /// The payload.
    pub data: PushPayload,
}

impl PushFrame {
    /// Method name for push deliveries.
    pub const PUSH_METHOD: &'static str = "push";

    /// Wraps a payload as a push frame from `form_id`.
    #[must_use]
    pub fn push(form_id: UserId, data: PushPayload) -> Self {
        Self {
            frame_type: FrameType::Data,
            method: Self::PUSH_METHOD.to_string(),
            form_id,
            data,
        }
    }
}
