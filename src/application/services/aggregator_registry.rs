//! Registry of live read-receipt aggregators keyed by conversation.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::read_receipt_aggregator::{AggregatorConfig, ReadReceiptAggregator};
use crate::domain::entities::{ConversationId, PushPayload};
use crate::domain::errors::DispatchError;

/// Owns one aggregator per active group conversation.
///
/// Lookup, creation, merge and retirement all happen under one lock, so a
/// receipt can never be merged into an aggregator that is being retired.
///
/// The registry only keeps a weak handle on the output channel. Live
/// aggregators hold the strong ones, so the channel closes once the
/// producers are gone and the registry is drained.
#[derive(Debug)]
pub struct AggregatorRegistry {
    config: AggregatorConfig,
    output: mpsc::WeakSender<PushPayload>,
    aggregators: Mutex<HashMap<ConversationId, ReadReceiptAggregator>>,
}

impl AggregatorRegistry {
    /// Creates an empty registry whose aggregators flush into `output`.
    #[must_use]
    pub fn new(config: AggregatorConfig, output: &mpsc::Sender<PushPayload>) -> Self {
        Self {
            config,
            output: output.downgrade(),
            aggregators: Mutex::new(HashMap::new()),
        }
    }

    /// Merges `payload` into its conversation's aggregator, creating and
    /// starting one seeded with `payload` if none exists.
    ///
    /// Returns true if a new aggregator was created.
    ///
    /// # Errors
    /// Returns `DispatchError::ChannelClosed` if a new aggregator is needed
    /// but the output channel has no live sender left.
    pub fn merge_push(&self, payload: PushPayload) -> Result<bool, DispatchError> {
        let mut aggregators = self.aggregators.lock();
        match aggregators.entry(payload.conversation_id.clone()) {
            Entry::Occupied(entry) => {
                entry.get().merge_push(payload);
                Ok(false)
            }
            Entry::Vacant(entry) => {
                let output = self.output.upgrade().ok_or(DispatchError::ChannelClosed)?;
                debug!(conversation_id = %entry.key(), "Starting read receipt aggregator");
                entry.insert(ReadReceiptAggregator::spawn(payload, self.config, output));
                Ok(true)
            }
        }
    }

    /// Clears and removes the aggregator for `conversation_id` if it is
    /// idle. Returns true if one was retired.
    pub fn retire_if_idle(&self, conversation_id: &ConversationId) -> bool {
        let mut aggregators = self.aggregators.lock();
        let idle = aggregators
            .get(conversation_id)
            .is_some_and(ReadReceiptAggregator::is_idle);
        if !idle {
            return false;
        }

        if let Some(aggregator) = aggregators.remove(conversation_id) {
            aggregator.clear();
        }
        debug!(conversation_id = %conversation_id, "Retired idle read receipt aggregator");
        true
    }

    /// True if an aggregator exists for `conversation_id`.
    #[must_use]
    pub fn contains(&self, conversation_id: &ConversationId) -> bool {
        self.aggregators.lock().contains_key(conversation_id)
    }

    /// Merge count of the aggregator for `conversation_id`, if any.
    #[must_use]
    pub fn merge_count(&self, conversation_id: &ConversationId) -> Option<usize> {
        self.aggregators
            .lock()
            .get(conversation_id)
            .map(ReadReceiptAggregator::merge_count)
    }

    /// Number of live aggregators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aggregators.lock().len()
    }

    /// True if no aggregator is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aggregators.lock().is_empty()
    }

    /// Clears every aggregator and returns the payloads they still held.
    pub fn drain(&self) -> Vec<PushPayload> {
        let drained: Vec<_> = self.aggregators.lock().drain().collect();
        drained
            .into_iter()
            .filter_map(|(_, aggregator)| aggregator.clear())
            .collect()
    }
}

impl Drop for AggregatorRegistry {
    fn drop(&mut self) {
        for aggregator in self.aggregators.get_mut().values() {
            aggregator.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::domain::entities::{ChatType, ContentType, MessageId, UserId};

    fn receipt(conversation: &str, message_id: &str) -> PushPayload {
        PushPayload {
            conversation_id: conversation.into(),
            chat_type: ChatType::Group,
            send_id: UserId::default(),
            recv_id: conversation.into(),
            recv_ids: Vec::new(),
            send_time: 0,
            content_type: ContentType::MarkRead,
            read_records: BTreeMap::from([(MessageId::from(message_id), "AQ==".to_string())]),
            msg_id: None,
            message_type: None,
            content: None,
        }
    }

    struct Harness {
        registry: AggregatorRegistry,
        tx: mpsc::Sender<PushPayload>,
        rx: mpsc::Receiver<PushPayload>,
    }

    fn harness() -> Harness {
        let (tx, rx) = mpsc::channel(16);
        let registry = AggregatorRegistry::new(AggregatorConfig::default(), &tx);
        Harness { registry, tx, rx }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_aggregator_per_conversation() {
        let h = harness();

        assert!(h.registry.merge_push(receipt("g1", "m1")).unwrap());
        assert!(!h.registry.merge_push(receipt("g1", "m2")).unwrap());
        assert!(h.registry.merge_push(receipt("g2", "m3")).unwrap());

        assert_eq!(h.registry.len(), 2);
        assert_eq!(h.registry.merge_count(&"g1".into()), Some(2));
        assert_eq!(h.registry.merge_count(&"g2".into()), Some(1));
        assert_eq!(h.registry.merge_count(&"g3".into()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_aggregator_is_not_retired() {
        let mut h = harness();
        h.registry.merge_push(receipt("g1", "m1")).unwrap();

        assert!(!h.registry.retire_if_idle(&"g1".into()));
        h.rx.recv().await.unwrap();
        assert!(!h.registry.retire_if_idle(&"g1".into()));
        assert!(h.registry.contains(&"g1".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_aggregator_is_retired_and_recreated() {
        let mut h = harness();
        let g1 = ConversationId::from("g1");
        h.registry.merge_push(receipt("g1", "m1")).unwrap();

        h.rx.recv().await.unwrap();
        let notice = h.rx.recv().await.unwrap();
        assert!(notice.is_empty());
        assert!(h.registry.retire_if_idle(&g1));
        assert!(!h.registry.contains(&g1));
        assert!(!h.registry.retire_if_idle(&g1));

        assert!(h.registry.merge_push(receipt("g1", "m2")).unwrap());
        assert_eq!(h.registry.merge_count(&g1), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_after_notice_prevents_retirement() {
        let mut h = harness();
        let g1 = ConversationId::from("g1");
        h.registry.merge_push(receipt("g1", "m1")).unwrap();
        h.rx.recv().await.unwrap();
        h.rx.recv().await.unwrap();

        h.registry.merge_push(receipt("g1", "m2")).unwrap();
        assert!(!h.registry.retire_if_idle(&g1));

        let flushed = h.rx.recv().await.unwrap();
        assert!(flushed.read_records.contains_key(&MessageId::from("m2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_returns_pending_payloads() {
        let h = harness();
        h.registry.merge_push(receipt("g1", "m1")).unwrap();
        h.registry.merge_push(receipt("g1", "m2")).unwrap();
        h.registry.merge_push(receipt("g2", "m3")).unwrap();

        let mut drained = h.registry.drain();
        drained.sort_by(|a, b| a.conversation_id.cmp(&b.conversation_id));
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].read_records.len(), 2);
        assert!(h.registry.is_empty());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(h.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_does_not_lose_flush_waiting_on_full_channel() {
        let (tx, mut rx) = mpsc::channel(1);
        let registry = AggregatorRegistry::new(AggregatorConfig::default(), &tx);
        tx.send(receipt("g0", "m0")).await.unwrap();
        for i in 0..10 {
            registry.merge_push(receipt("g1", &format!("m{i}"))).unwrap();
        }

        // The count flush is taken and now waits for room in the channel.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(registry.merge_count(&"g1".into()), Some(0));
        assert!(registry.drain().is_empty());
        drop(tx);

        let mut received = Vec::new();
        while let Some(payload) = rx.recv().await {
            received.push(payload);
        }
        let g1: Vec<_> = received
            .iter()
            .filter(|p| p.conversation_id.as_str() == "g1")
            .collect();
        assert_eq!(g1.len(), 1);
        assert_eq!(g1[0].read_records.len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_merges_share_one_aggregator() {
        let (tx, _rx) = mpsc::channel(16);
        let config = AggregatorConfig::new(Duration::from_secs(60), 100_000);
        let registry = Arc::new(AggregatorRegistry::new(config, &tx));
        let runtime = tokio::runtime::Handle::current();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let (registry, runtime) = (registry.clone(), runtime.clone());
                std::thread::spawn(move || {
                    let _guard = runtime.enter();
                    (0..50)
                        .filter(|i| {
                            registry
                                .merge_push(receipt("g1", &format!("m{t}-{i}")))
                                .unwrap()
                        })
                        .count()
                })
            })
            .collect();

        let created: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(created, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.merge_count(&"g1".into()), Some(400));
        registry.drain();
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_closes_after_drain() {
        let Harness { registry, tx, mut rx } = harness();
        registry.merge_push(receipt("g1", "m1")).unwrap();
        drop(tx);

        assert!(registry.merge_push(receipt("g1", "m2")).is_ok());
        assert!(matches!(
            registry.merge_push(receipt("g2", "m3")),
            Err(DispatchError::ChannelClosed)
        ));

        registry.drain();
        assert!(rx.recv().await.is_none());
    }
}
