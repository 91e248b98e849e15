//! Read receipt fan-out.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::application::services::{AggregatorRegistry, DeliveryService};
use crate::domain::entities::{
    ChatMessage, ChatType, DIRECT_READ_SENTINEL, MarkReadEvent, MessageId, PushPayload,
    ReadBitmap, UserId,
};
use crate::domain::errors::DispatchError;
use crate::domain::ports::{ChatLogStorePort, EventConsumerPort};

/// How group read receipts reach the push channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupReadMode {
    /// Merged per conversation by an aggregator.
    #[default]
    Batched,
    /// Forwarded one by one.
    Immediate,
}

impl fmt::Display for GroupReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batched => write!(f, "batched"),
            Self::Immediate => write!(f, "immediate"),
        }
    }
}

impl FromStr for GroupReadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "batched" => Ok(Self::Batched),
            "immediate" => Ok(Self::Immediate),
            other => Err(format!("unknown read mode '{other}'")),
        }
    }
}

/// Updates read state for mark-read events and emits read-receipt pushes.
pub struct ReadFanoutDispatcher {
    store: Arc<dyn ChatLogStorePort>,
    registry: Arc<AggregatorRegistry>,
    output: mpsc::Sender<PushPayload>,
    mode: GroupReadMode,
}

impl ReadFanoutDispatcher {
    /// Creates new read dispatcher writing direct receipts to `output` and
    /// routing group receipts according to `mode`.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatLogStorePort>,
        registry: Arc<AggregatorRegistry>,
        output: mpsc::Sender<PushPayload>,
        mode: GroupReadMode,
    ) -> Self {
        Self {
            store,
            registry,
            output,
            mode,
        }
    }

    /// Handles one mark-read event.
    ///
    /// Every listed message that exists gets its read state updated and
    /// persisted before anything is emitted.
    ///
    /// # Errors
    /// Returns error if loading or persisting read state fails, a stored
    /// bitmap is invalid, or the push channel is closed.
    pub async fn on_read_event(&self, event: MarkReadEvent) -> Result<(), DispatchError> {
        let read_records = self.update_read_state(&event).await?;
        let mut payload = PushPayload::mark_read(&event, read_records);

        match (event.chat_type, self.mode) {
            (ChatType::Direct, _) => self.emit(payload).await,
            (ChatType::Group, GroupReadMode::Immediate) => {
                payload.send_id = UserId::default();
                self.emit(payload).await
            }
            (ChatType::Group, GroupReadMode::Batched) => {
                payload.send_id = UserId::default();
                self.registry.merge_push(payload)?;
                Ok(())
            }
        }
    }

    async fn update_read_state(
        &self,
        event: &MarkReadEvent,
    ) -> Result<BTreeMap<MessageId, String>, DispatchError> {
        let messages = self.store.list_by_message_ids(&event.message_ids).await?;
        if messages.len() < event.message_ids.len() {
            debug!(
                conversation_id = %event.conversation_id,
                requested = event.message_ids.len(),
                found = messages.len(),
                "Some read messages are unknown"
            );
        }

        let mut read_records = BTreeMap::new();
        for message in messages {
            let bytes = mark_read_by(&message, &event.send_id)?;
            self.store.update_read_state(&message.id, &bytes).await?;
            read_records.insert(message.id, BASE64.encode(&bytes));
        }
        Ok(read_records)
    }

    async fn emit(&self, payload: PushPayload) -> Result<(), DispatchError> {
        self.output
            .send(payload)
            .await
            .map_err(|_| DispatchError::ChannelClosed)
    }
}

/// Read-state bytes of `message` after `reader` read it.
fn mark_read_by(message: &ChatMessage, reader: &UserId) -> Result<Vec<u8>, DispatchError> {
    match message.chat_type {
        ChatType::Direct => Ok(DIRECT_READ_SENTINEL.to_vec()),
        ChatType::Group => {
            let bitmap = ReadBitmap::load(message.read_records.clone())?;
            bitmap.set_by_hash(reader.as_str())?;
            Ok(bitmap.export())
        }
    }
}

#[async_trait]
impl EventConsumerPort for ReadFanoutDispatcher {
    async fn consume(&self, key: &str, value: &str) -> Result<(), DispatchError> {
        debug!(key, "Consuming mark-read event");
        let event: MarkReadEvent = serde_json::from_str(value)?;
        self.on_read_event(event).await
    }
}

/// Drains the read-receipt push channel into the delivery service and
/// retires group aggregators that reported idle.
pub struct ReadPushOutlet {
    delivery: DeliveryService,
    registry: Arc<AggregatorRegistry>,
}

impl ReadPushOutlet {
    /// Creates new outlet.
    #[must_use]
    pub const fn new(delivery: DeliveryService, registry: Arc<AggregatorRegistry>) -> Self {
        Self { delivery, registry }
    }

    /// Runs until every sender of `payloads` is dropped.
    pub async fn run(self, mut payloads: mpsc::Receiver<PushPayload>) {
        while let Some(payload) = payloads.recv().await {
            let conversation_id = payload.conversation_id.clone();
            let is_group = payload.chat_type.is_group();

            if payload.is_empty() {
                trace!(conversation_id = %conversation_id, "Skipping empty read receipt payload");
            } else if let Err(e) = self.delivery.deliver(payload).await {
                error!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Failed to deliver read receipt push"
                );
            }

            if is_group {
                self.registry.retire_if_idle(&conversation_id);
            }
        }

        debug!("Read receipt outlet stopped");
    }
}
