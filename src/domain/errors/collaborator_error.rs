//! Errors reported by external collaborators.

use thiserror::Error;

use crate::domain::entities::MessageId;

/// Persistent store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum StoreError {
    #[error("chat log already exists: {existing}")]
    Duplicate { existing: MessageId },

    #[error("record not found: {key}")]
    NotFound { key: String },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Creates duplicate error naming the already stored message.
    #[must_use]
    pub fn duplicate(existing: impl Into<MessageId>) -> Self {
        Self::Duplicate {
            existing: existing.into(),
        }
    }

    /// Creates unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Group membership resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum MembershipError {
    #[error("group not found: {group_id}")]
    GroupNotFound { group_id: String },

    #[error("membership service unavailable: {message}")]
    Unavailable { message: String },
}

impl MembershipError {
    /// Creates group not found error.
    #[must_use]
    pub fn group_not_found(group_id: impl Into<String>) -> Self {
        Self::GroupNotFound {
            group_id: group_id.into(),
        }
    }

    /// Creates unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Push-delivery failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum DeliveryError {
    #[error("push connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("push send failed: {message}")]
    SendFailed { message: String },

    #[error("failed to encode push frame: {message}")]
    Encoding { message: String },
}

impl DeliveryError {
    /// Creates connection failed error.
    #[must_use]
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Creates send failed error.
    #[must_use]
    pub fn send_failed(message: impl Into<String>) -> Self {
        Self::SendFailed {
            message: message.into(),
        }
    }

    /// Creates encoding error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }
}
