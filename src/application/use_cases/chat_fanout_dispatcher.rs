//! Chat message fan-out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::application::services::DeliveryService;
use crate::domain::entities::{ChatMessage, ChatTransferEvent, ChatType, PushPayload};
use crate::domain::errors::{DispatchError, StoreError};
use crate::domain::ports::{ChatLogStorePort, EventConsumerPort};

/// Persists inbound chat messages and pushes them to their recipients.
#[derive(Clone)]
pub struct ChatFanoutDispatcher {
    store: Arc<dyn ChatLogStorePort>,
    delivery: DeliveryService,
}

impl ChatFanoutDispatcher {
    /// Creates new chat dispatcher.
    #[must_use]
    pub const fn new(store: Arc<dyn ChatLogStorePort>, delivery: DeliveryService) -> Self {
        Self { store, delivery }
    }

    /// Handles one chat event.
    ///
    /// The message is persisted first. A message the store already holds is
    /// still delivered, so replays after a crash between persist and push
    /// reach the recipients.
    ///
    /// # Errors
    /// Returns error if persistence, recipient resolution or the push fails.
    /// Nothing is pushed when persistence or resolution fails.
    pub async fn on_chat_event(&self, event: ChatTransferEvent) -> Result<(), DispatchError> {
        let message = ChatMessage::from_event(&event);
        let message = match self.store.insert_chat_log(&message).await {
            Ok(id) => message.with_id(id),
            Err(StoreError::Duplicate { existing }) => {
                info!(
                    conversation_id = %message.conversation_id,
                    message_id = %existing,
                    "Chat log already stored, delivering anyway"
                );
                message.with_id(existing)
            }
            Err(e) => {
                warn!(conversation_id = %message.conversation_id, error = %e, "Failed to store chat log");
                return Err(e.into());
            }
        };

        self.store.update_conversation_last_message(&message).await?;

        let mut payload = PushPayload::chat(&message);
        if message.chat_type == ChatType::Group {
            payload.recv_ids = self
                .delivery
                .resolve_recipients(&message.recv_id, &message.send_id)
                .await?;
            if payload.recv_ids.is_empty() {
                debug!(
                    conversation_id = %message.conversation_id,
                    "No group members besides the sender"
                );
                return Ok(());
            }
        }

        self.delivery.deliver(payload).await
    }
}

#[async_trait]
impl EventConsumerPort for ChatFanoutDispatcher {
    async fn consume(&self, key: &str, value: &str) -> Result<(), DispatchError> {
        debug!(key, "Consuming chat transfer event");
        let event: ChatTransferEvent = serde_json::from_str(value)?;
        self.on_chat_event(event).await
    }
}
