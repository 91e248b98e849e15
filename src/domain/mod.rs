//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{ChatType, PushPayload, ReadBitmap};
pub use errors::{BitmapError, DispatchError};
pub use ports::{ChatLogStorePort, EventConsumerPort, MembershipPort, PushSenderPort};
