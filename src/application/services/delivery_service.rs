//! Recipient resolution and push hand-off.

use std::sync::Arc;

use tracing::debug;

use crate::domain::entities::{ChatType, PushFrame, PushPayload, UserId};
use crate::domain::errors::{DispatchError, MembershipError};
use crate::domain::ports::{MembershipPort, PushSenderPort};

/// Wraps payloads in push frames and hands them to the push sender,
/// expanding group payloads into their member list on the way.
#[derive(Clone)]
pub struct DeliveryService {
    membership: Arc<dyn MembershipPort>,
    sender: Arc<dyn PushSenderPort>,
    system_id: UserId,
}

impl DeliveryService {
    /// Creates new delivery service sending frames as `system_id`.
    #[must_use]
    pub const fn new(
        membership: Arc<dyn MembershipPort>,
        sender: Arc<dyn PushSenderPort>,
        system_id: UserId,
    ) -> Self {
        Self {
            membership,
            sender,
            system_id,
        }
    }

    /// Lists the members of `group_id` except `exclude`.
    ///
    /// # Errors
    /// Returns error if the membership lookup fails.
    pub async fn resolve_recipients(
        &self,
        group_id: &UserId,
        exclude: &UserId,
    ) -> Result<Vec<UserId>, MembershipError> {
        let members = self.membership.list_group_members(group_id).await?;
        Ok(members
            .into_iter()
            .filter(|member| member != exclude)
            .collect())
    }

    /// Delivers one payload.
    ///
    /// Group payloads without an explicit recipient list are resolved
    /// against the membership of `recv_id` first, leaving out `send_id`.
    ///
    /// # Errors
    /// Returns error if recipient resolution or the push send fails.
    pub async fn deliver(&self, mut payload: PushPayload) -> Result<(), DispatchError> {
        if payload.chat_type == ChatType::Group && payload.recv_ids.is_empty() {
            payload.recv_ids = self
                .resolve_recipients(&payload.recv_id, &payload.send_id)
                .await?;
            if payload.recv_ids.is_empty() {
                debug!(
                    conversation_id = %payload.conversation_id,
                    group_id = %payload.recv_id,
                    "Group has no other members, nothing to push"
                );
                return Ok(());
            }
        }

        let frame = PushFrame::push(self.system_id.clone(), payload);
        self.sender.send(&frame).await?;
        debug!(
            conversation_id = %frame.data.conversation_id,
            content_type = ?frame.data.content_type,
            recipients = frame.data.recv_ids.len().max(1),
            "Push handed off"
        );
        Ok(())
    }
}
