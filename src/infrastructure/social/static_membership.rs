//! Membership backed by the configured group table.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::entities::UserId;
use crate::domain::errors::MembershipError;
use crate::domain::ports::MembershipPort;

/// Resolves group members from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticMembership {
    groups: BTreeMap<UserId, Vec<UserId>>,
}

impl StaticMembership {
    /// Creates membership from a group id to members table.
    #[must_use]
    pub const fn new(groups: BTreeMap<UserId, Vec<UserId>>) -> Self {
        Self { groups }
    }
}

#[async_trait]
impl MembershipPort for StaticMembership {
    async fn list_group_members(&self, group_id: &UserId) -> Result<Vec<UserId>, MembershipError> {
        self.groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| MembershipError::group_not_found(group_id.as_str()))
    }
}
