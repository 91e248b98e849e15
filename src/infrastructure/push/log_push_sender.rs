//! Push sender that only logs frames.

use async_trait::async_trait;
use tracing::info;

use crate::domain::entities::PushFrame;
use crate::domain::errors::DeliveryError;
use crate::domain::ports::PushSenderPort;

/// Writes every frame to the log as JSON. Used when no push endpoint is
/// configured.
#[derive(Debug, Default)]
pub struct LogPushSender;

impl LogPushSender {
    /// Creates new log sender.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushSenderPort for LogPushSender {
    async fn send(&self, frame: &PushFrame) -> Result<(), DeliveryError> {
        let json =
            serde_json::to_string(frame).map_err(|e| DeliveryError::encoding(e.to_string()))?;
        info!(
            conversation_id = %frame.data.conversation_id,
            frame = %json,
            "Push frame"
        );
        Ok(())
    }
}
