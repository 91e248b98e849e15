//! Push-delivery port.

use async_trait::async_trait;

use crate::domain::entities::PushFrame;
use crate::domain::errors::DeliveryError;

/// Port for handing frames to the push-delivery layer.
#[async_trait]
pub trait PushSenderPort: Send + Sync {
    /// Sends one frame. Failures are not retried by the caller.
    async fn send(&self, frame: &PushFrame) -> Result<(), DeliveryError>;
}
