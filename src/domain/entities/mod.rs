//! Domain entity definitions.

mod chat_type;
mod events;
mod ids;
mod message;
mod push;
mod read_bitmap;

pub use chat_type::ChatType;
pub use events::{ChatTransferEvent, MarkReadEvent};
pub use ids::{ConversationId, MessageId, UserId};
pub use message::{ChatMessage, now_millis};
pub use push::{ContentType, FrameType, PushFrame, PushPayload};
pub use read_bitmap::{
    DEFAULT_SIZE_BYTES, DIRECT_READ_SENTINEL, MAX_SIZE_BYTES, ReadBitmap, member_hash,
};
