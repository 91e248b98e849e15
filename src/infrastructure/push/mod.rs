//! Push delivery adapters.

mod log_push_sender;
mod ws_push_sender;

pub use log_push_sender::LogPushSender;
pub use ws_push_sender::WsPushSender;
