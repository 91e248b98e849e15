//! Event dispatch error types.

use thiserror::Error;

use super::{BitmapError, DeliveryError, MembershipError, StoreError};

/// Failure while turning one inbound event into push deliveries.
///
/// Every variant is scoped to the event being processed; consumer loops log
/// it and move on to the next event.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DispatchError {
    #[error("malformed event payload: {message}")]
    Malformed { message: String },

    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error("membership resolution failed: {0}")]
    Membership(#[from] MembershipError),

    #[error("push delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("read state error: {0}")]
    Bitmap(#[from] BitmapError),

    #[error("push channel closed")]
    ChannelClosed,
}

impl DispatchError {
    /// Creates malformed payload error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Returns whether replaying the event from the queue could succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Unavailable { .. })
                | Self::Membership(MembershipError::Unavailable { .. })
                | Self::Delivery(_)
        )
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(error: serde_json::Error) -> Self {
        Self::malformed(error.to_string())
    }
}
