//! Queue consumption shell.

mod consumer_loop;
mod line_source;
mod topic;

pub use consumer_loop::{ConsumerLoop, ConsumerStats};
pub use line_source::{LineEventSource, SourceStats, TopicReceivers, TopicRouter};
pub use topic::{CHAT_TRANSFER_TOPIC, QueueEnvelope, QueueMessage, READ_TRANSFER_TOPIC, Topic};
