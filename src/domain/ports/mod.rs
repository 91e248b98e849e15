mod chat_log_store_port;
mod event_consumer_port;
mod membership_port;
mod push_sender_port;

pub use chat_log_store_port::ChatLogStorePort;
pub use event_consumer_port::EventConsumerPort;
pub use membership_port::MembershipPort;
pub use push_sender_port::PushSenderPort;
