//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Push delivery adapters.
pub mod push;
/// Queue consumption shell.
pub mod queue;
/// Group membership adapters.
pub mod social;
/// Chat log storage adapters.
pub mod storage;

pub use config::{AppConfig, CliArgs, ConfigError, ConfigStore, LogLevel};
pub use push::{LogPushSender, WsPushSender};
pub use queue::{ConsumerLoop, LineEventSource, Topic, TopicRouter};
pub use social::StaticMembership;
pub use storage::MemoryChatLogStore;
