//! Chat log persistence port.

use async_trait::async_trait;

use crate::domain::entities::{ChatMessage, MessageId};
use crate::domain::errors::StoreError;

/// Port for chat log persistence.
#[async_trait]
pub trait ChatLogStorePort: Send + Sync {
    /// Appends a chat log and returns its assigned id.
    ///
    /// Returns `StoreError::Duplicate` if the same message was already stored.
    async fn insert_chat_log(&self, message: &ChatMessage) -> Result<MessageId, StoreError>;

    /// Fetches the records for `ids`; unknown ids are skipped.
    async fn list_by_message_ids(&self, ids: &[MessageId]) -> Result<Vec<ChatMessage>, StoreError>;

    /// Replaces the read-state bytes of one message.
    async fn update_read_state(&self, id: &MessageId, read_records: &[u8]) -> Result<(), StoreError>;

    /// Records `message` as the latest message of its conversation.
    async fn update_conversation_last_message(&self, message: &ChatMessage)
    -> Result<(), StoreError>;
}
