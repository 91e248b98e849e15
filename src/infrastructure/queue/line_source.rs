//! Line-delimited queue source.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::topic::{QueueEnvelope, QueueMessage, Topic};

/// Receiving halves of the per-topic channels.
#[derive(Debug)]
pub struct TopicReceivers {
    /// Chat transfer messages.
    pub chat: mpsc::Receiver<QueueMessage>,
    /// Read transfer messages.
    pub read: mpsc::Receiver<QueueMessage>,
}

/// Routes queue messages to one bounded channel per topic.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    chat: mpsc::Sender<QueueMessage>,
    read: mpsc::Sender<QueueMessage>,
}

impl TopicRouter {
    /// Creates a router and the receivers its channels feed.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, TopicReceivers) {
        let (chat_tx, chat_rx) = mpsc::channel(capacity);
        let (read_tx, read_rx) = mpsc::channel(capacity);
        (
            Self {
                chat: chat_tx,
                read: read_tx,
            },
            TopicReceivers {
                chat: chat_rx,
                read: read_rx,
            },
        )
    }

    /// Queues `message` for `topic`, waiting while the channel is full.
    /// Returns false if the topic's consumer is gone.
    pub async fn route(&self, topic: Topic, message: QueueMessage) -> bool {
        let sender = match topic {
            Topic::ChatTransfer => &self.chat,
            Topic::ReadTransfer => &self.read,
        };
        sender.send(message).await.is_ok()
    }
}

/// Counters reported when a source stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Lines handed to a topic channel.
    pub routed: usize,
    /// Blank, malformed or unknown-topic lines.
    pub skipped: usize,
}

/// Reads one JSON envelope per line and routes it by topic.
pub struct LineEventSource<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> LineEventSource<R> {
    /// Creates a source over `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Runs until end of input, cancellation, or a consumer going away.
    ///
    /// # Errors
    /// Returns error if reading from the input fails.
    pub async fn run(
        mut self,
        router: TopicRouter,
        cancel: CancellationToken,
    ) -> io::Result<SourceStats> {
        let mut stats = SourceStats::default();

        loop {
            let line = tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Event source cancelled");
                    break;
                }
                line = self.lines.next_line() => line?,
            };
            let Some(line) = line else {
                info!("Event source reached end of input");
                break;
            };

            let Some((topic, message)) = parse_line(&line) else {
                stats.skipped += 1;
                continue;
            };
            if !router.route(topic, message).await {
                warn!(topic = %topic, "Topic consumer stopped, closing event source");
                break;
            }
            stats.routed += 1;
        }

        Ok(stats)
    }
}

fn parse_line(line: &str) -> Option<(Topic, QueueMessage)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let envelope: QueueEnvelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Skipping malformed queue line");
            return None;
        }
    };

    match envelope.topic.parse::<Topic>() {
        Ok(topic) => Some((topic, envelope.into())),
        Err(e) => {
            warn!(key = %envelope.key, error = %e, "Skipping queue line");
            None
        }
    }
}
