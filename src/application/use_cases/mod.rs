//! Use case implementations.

mod chat_fanout_dispatcher;
mod read_fanout_dispatcher;

pub use chat_fanout_dispatcher::ChatFanoutDispatcher;
pub use read_fanout_dispatcher::{GroupReadMode, ReadFanoutDispatcher, ReadPushOutlet};
