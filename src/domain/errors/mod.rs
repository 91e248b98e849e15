//! Domain error types.

mod bitmap_error;
mod collaborator_error;
mod dispatch_error;

pub use bitmap_error::BitmapError;
pub use collaborator_error::{DeliveryError, MembershipError, StoreError};
pub use dispatch_error::DispatchError;
