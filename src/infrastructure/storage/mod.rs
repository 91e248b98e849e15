//! Chat log storage adapters.

mod memory_chat_log_store;

pub use memory_chat_log_store::MemoryChatLogStore;
