//! Group membership resolution port.

use async_trait::async_trait;

use crate::domain::entities::UserId;
use crate::domain::errors::MembershipError;

/// Port for resolving the members of a group.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipPort: Send + Sync {
    /// Lists every member of `group_id`, including the caller's own sender.
    async fn list_group_members(&self, group_id: &UserId) -> Result<Vec<UserId>, MembershipError>;
}
