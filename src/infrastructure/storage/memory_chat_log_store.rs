//! In-process chat log store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::{ChatMessage, ConversationId, MessageId, UserId};
use crate::domain::errors::StoreError;
use crate::domain::ports::ChatLogStorePort;

/// A message is identified by who sent it where and when.
type DedupKey = (ConversationId, UserId, i64);

#[derive(Default)]
struct StoreState {
    messages: HashMap<MessageId, ChatMessage>,
    by_origin: HashMap<DedupKey, MessageId>,
    conversations: HashMap<ConversationId, ChatMessage>,
}

/// Chat log store kept in memory for the lifetime of the process.
#[derive(Default)]
pub struct MemoryChatLogStore {
    state: RwLock<StoreState>,
}

impl MemoryChatLogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().messages.len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().messages.is_empty()
    }

    /// Latest message of `conversation_id`, if any.
    #[must_use]
    pub fn last_message(&self, conversation_id: &ConversationId) -> Option<ChatMessage> {
        self.state.read().conversations.get(conversation_id).cloned()
    }
}

#[async_trait]
impl ChatLogStorePort for MemoryChatLogStore {
    async fn insert_chat_log(&self, message: &ChatMessage) -> Result<MessageId, StoreError> {
        let key = (
            message.conversation_id.clone(),
            message.send_id.clone(),
            message.send_time,
        );
        let mut state = self.state.write();
        if let Some(existing) = state.by_origin.get(&key) {
            return Err(StoreError::duplicate(existing.clone()));
        }

        let id = MessageId(Uuid::new_v4().to_string());
        state.by_origin.insert(key, id.clone());
        state
            .messages
            .insert(id.clone(), message.clone().with_id(id.clone()));
        debug!(message_id = %id, conversation_id = %message.conversation_id, "Stored chat log");
        Ok(id)
    }

    async fn list_by_message_ids(&self, ids: &[MessageId]) -> Result<Vec<ChatMessage>, StoreError> {
        let state = self.state.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.messages.get(id).cloned())
            .collect())
    }

    async fn update_read_state(&self, id: &MessageId, read_records: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let message = state
            .messages
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { key: id.to_string() })?;
        message.read_records = read_records.to_vec();
        Ok(())
    }

    async fn update_conversation_last_message(
        &self,
        message: &ChatMessage,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let newer = state
            .conversations
            .get(&message.conversation_id)
            .is_none_or(|current| current.send_time <= message.send_time);
        if newer {
            state
                .conversations
                .insert(message.conversation_id.clone(), message.clone());
        }
        Ok(())
    }
}
