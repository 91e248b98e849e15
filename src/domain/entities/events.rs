//! Inbound queue event schemas.

use serde::{Deserialize, Serialize};

use super::{ChatType, ConversationId, MessageId, UserId, now_millis};

/// A chat message handed over by the send path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTransferEvent {
    pub conversation_id: ConversationId,
    pub send_id: UserId,
    pub recv_id: UserId,
    pub chat_type: ChatType,
    #[serde(default)]
    pub message_type: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default = "now_millis")]
    pub send_time: i64,
}

/// A member acknowledging a set of messages as read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadEvent {
    pub conversation_id: ConversationId,
    pub chat_type: ChatType,
    /// The reader.
    pub send_id: UserId,
    /// Peer for direct chats, group id for group chats.
    #[serde(default)]
    pub recv_id: UserId,
    #[serde(default)]
    pub message_ids: Vec<MessageId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_transfer() {
        let json = r#"{
            "conversation_id": "c1",
            "send_id": "u1",
            "recv_id": "u2",
            "chat_type": "direct",
            "message_type": 0,
            "content": "hello",
            "send_time": 1700000000000
        }"#;

        let event: ChatTransferEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.chat_type, ChatType::Direct);
        assert_eq!(event.recv_id.as_str(), "u2");
        assert_eq!(event.send_time, 1_700_000_000_000);
    }

    #[test]
    fn test_chat_transfer_defaults_send_time() {
        let json = r#"{"conversation_id":"c1","send_id":"u1","recv_id":"g1","chat_type":1}"#;

        let event: ChatTransferEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.chat_type, ChatType::Group);
        assert!(event.send_time > 0);
        assert!(event.content.is_empty());
    }

    #[test]
    fn test_parse_mark_read() {
        let json = r#"{
            "conversation_id": "g1",
            "chat_type": 1,
            "send_id": "u3",
            "recv_id": "g1",
            "message_ids": ["m1", "m2"]
        }"#;

        let event: MarkReadEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.message_ids, vec![MessageId::from("m1"), MessageId::from("m2")]);
    }

    #[test]
    fn test_mark_read_rejects_unknown_chat_type() {
        let json = r#"{"conversation_id":"g1","chat_type":9,"send_id":"u3"}"#;
        assert!(serde_json::from_str::<MarkReadEvent>(json).is_err());
    }
}
