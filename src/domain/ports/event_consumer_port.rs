//! Inbound queue consumer port.

use async_trait::async_trait;

use crate::domain::errors::DispatchError;

/// Handler for the raw messages of one queue topic.
#[async_trait]
pub trait EventConsumerPort: Send + Sync {
    /// Processes one queue message. `key` is the queue's message key and is
    /// only used for log context.
    async fn consume(&self, key: &str, value: &str) -> Result<(), DispatchError>;
}
