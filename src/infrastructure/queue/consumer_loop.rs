//! Sequential per-topic consumption.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::topic::{QueueMessage, Topic};
use crate::domain::ports::EventConsumerPort;

/// Counters reported when a consumer loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages handled successfully.
    pub processed: usize,
    /// Messages whose handling failed.
    pub failed: usize,
}

/// Feeds one topic's messages to its handler, one at a time.
pub struct ConsumerLoop {
    topic: Topic,
    handler: Arc<dyn EventConsumerPort>,
}

impl ConsumerLoop {
    /// Creates a loop for `topic`.
    #[must_use]
    pub fn new(topic: Topic, handler: Arc<dyn EventConsumerPort>) -> Self {
        Self { topic, handler }
    }

    /// Runs until the channel closes. Failed messages are logged and skipped.
    pub async fn run(self, mut messages: mpsc::Receiver<QueueMessage>) -> ConsumerStats {
        let mut stats = ConsumerStats::default();

        while let Some(message) = messages.recv().await {
            match self.handler.consume(&message.key, &message.value).await {
                Ok(()) => stats.processed += 1,
                Err(e) if e.is_recoverable() => {
                    stats.failed += 1;
                    warn!(topic = %self.topic, key = %message.key, error = %e, "Failed to handle queue message");
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(topic = %self.topic, key = %message.key, error = %e, "Dropping queue message");
                }
            }
        }

        debug!(
            topic = %self.topic,
            processed = stats.processed,
            failed = stats.failed,
            "Consumer loop stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::domain::errors::{DispatchError, StoreError};

    #[derive(Default)]
    struct ScriptedHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventConsumerPort for ScriptedHandler {
        async fn consume(&self, key: &str, value: &str) -> Result<(), DispatchError> {
            self.seen.lock().push(key.to_string());
            match value {
                "bad" => Err(DispatchError::malformed("bad")),
                "down" => Err(StoreError::unavailable("down").into()),
                _ => Ok(()),
            }
        }
    }

    fn message(key: &str, value: &str) -> QueueMessage {
        QueueMessage {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_loop() {
        let handler = Arc::new(ScriptedHandler::default());
        let (tx, rx) = mpsc::channel(8);
        for (key, value) in [("k1", "ok"), ("k2", "bad"), ("k3", "down"), ("k4", "ok")] {
            tx.send(message(key, value)).await.unwrap();
        }
        drop(tx);

        let stats = ConsumerLoop::new(Topic::ChatTransfer, handler.clone())
            .run(rx)
            .await;

        assert_eq!(stats, ConsumerStats { processed: 2, failed: 2 });
        assert_eq!(*handler.seen.lock(), vec!["k1", "k2", "k3", "k4"]);
    }
}
