//! Per-conversation batching of group read receipts.
//!
//! An aggregator holds at most one pending payload and folds later receipts
//! into it. A timing task flushes the pending payload when enough receipts
//! were merged or enough time passed since the last flush. Once nothing has
//! happened for twice the delay it emits a single empty payload for its
//! conversation so the owner can retire it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::domain::entities::{ConversationId, PushPayload};

const DEFAULT_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_DELAY_COUNT: usize = 10;
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Flush thresholds shared by every aggregator of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Maximum time a pending payload waits before being flushed.
    pub delay: Duration,
    /// Number of merged receipts that forces a flush.
    pub delay_count: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            delay_count: DEFAULT_DELAY_COUNT,
        }
    }
}

impl AggregatorConfig {
    /// Builds a config, keeping the default for any zero threshold.
    #[must_use]
    pub fn new(delay: Duration, delay_count: usize) -> Self {
        let defaults = Self::default();
        Self {
            delay: if delay.is_zero() { defaults.delay } else { delay },
            delay_count: if delay_count == 0 {
                defaults.delay_count
            } else {
                delay_count
            },
        }
    }

    /// Period of the timing loop.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        (self.delay / 4).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }

    /// Quiet period after which an empty aggregator counts as idle.
    #[must_use]
    pub fn idle_window(&self) -> Duration {
        self.delay.saturating_mul(2)
    }
}

/// Observable lifecycle of an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// A payload is waiting for its flush.
    Accumulating,
    /// Nothing is pending.
    Empty,
    /// Cleared by its owner; the timing task has stopped.
    Retired,
}

/// What one timing tick decided.
#[derive(Debug)]
enum Tick {
    Flush(PushPayload),
    IdleNotice,
    Wait,
}

#[derive(Debug)]
struct Accumulator {
    pending: Option<PushPayload>,
    merge_count: usize,
    last_flush: Instant,
    idle_notified: bool,
}

impl Accumulator {
    fn seeded(payload: PushPayload, now: Instant) -> Self {
        Self {
            pending: Some(payload),
            merge_count: 1,
            last_flush: now,
            idle_notified: false,
        }
    }

    fn merge(&mut self, payload: PushPayload) {
        self.merge_count += 1;
        self.idle_notified = false;
        match self.pending.as_mut() {
            Some(pending) => pending.merge_read_records(payload.read_records),
            None => self.pending = Some(payload),
        }
    }

    fn is_idle(&self, now: Instant, config: &AggregatorConfig) -> bool {
        self.pending.is_none()
            && self.merge_count == 0
            && now.saturating_duration_since(self.last_flush) >= config.idle_window()
    }

    fn tick(&mut self, now: Instant, config: &AggregatorConfig) -> Tick {
        let elapsed = now.saturating_duration_since(self.last_flush);
        if self.merge_count >= config.delay_count || elapsed >= config.delay {
            if let Some(payload) = self.pending.take() {
                self.merge_count = 0;
                self.last_flush = now;
                return Tick::Flush(payload);
            }
        }

        if !self.idle_notified && self.is_idle(now, config) {
            self.idle_notified = true;
            return Tick::IdleNotice;
        }

        Tick::Wait
    }
}

/// Batches read receipts for one group conversation.
///
/// Cloning yields another handle to the same aggregator.
#[derive(Debug, Clone)]
pub struct ReadReceiptAggregator {
    conversation_id: ConversationId,
    config: AggregatorConfig,
    accumulator: Arc<Mutex<Accumulator>>,
    cancel: CancellationToken,
}

impl ReadReceiptAggregator {
    /// Creates an aggregator seeded with `payload` and starts its timing
    /// task. Flushed payloads and the idle notice go to `output`.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(
        payload: PushPayload,
        config: AggregatorConfig,
        output: mpsc::Sender<PushPayload>,
    ) -> Self {
        let aggregator = Self {
            conversation_id: payload.conversation_id.clone(),
            config,
            accumulator: Arc::new(Mutex::new(Accumulator::seeded(payload, Instant::now()))),
            cancel: CancellationToken::new(),
        };

        tokio::spawn(aggregator.clone().run(output));
        aggregator
    }

    /// Folds `payload` into the pending payload, or makes it the pending
    /// payload if none is held.
    pub fn merge_push(&self, payload: PushPayload) {
        let mut accumulator = self.accumulator.lock();
        accumulator.merge(payload);
        trace!(
            conversation_id = %self.conversation_id,
            merge_count = accumulator.merge_count,
            "Merged read receipt"
        );
    }

    /// True when nothing is pending, nothing was merged since the last
    /// flush and the idle window has elapsed.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.accumulator.lock().is_idle(Instant::now(), &self.config)
    }

    /// Receipts merged since the last flush, the seed included.
    #[must_use]
    pub fn merge_count(&self) -> usize {
        self.accumulator.lock().merge_count
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AggregatorState {
        if self.cancel.is_cancelled() {
            AggregatorState::Retired
        } else if self.accumulator.lock().pending.is_some() {
            AggregatorState::Accumulating
        } else {
            AggregatorState::Empty
        }
    }

    /// Stops the timing task and returns whatever was still pending.
    /// Calling it again is a no-op returning `None`.
    ///
    /// A flush already taken by the timing task is not returned here; the
    /// task finishes sending it before it stops.
    pub fn clear(&self) -> Option<PushPayload> {
        self.cancel.cancel();
        let mut accumulator = self.accumulator.lock();
        accumulator.merge_count = 0;
        accumulator.pending.take()
    }

    async fn run(self, output: mpsc::Sender<PushPayload>) {
        let start = Instant::now() + self.config.delay / 2;
        let mut ticker = interval_at(start, self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let tick = self.accumulator.lock().tick(Instant::now(), &self.config);
            match tick {
                Tick::Flush(payload) => {
                    debug!(
                        conversation_id = %self.conversation_id,
                        records = payload.read_records.len(),
                        "Flushing merged read receipts"
                    );
                    // Once taken the payload lives only here, so this send is
                    // not cut short by cancellation.
                    if output.send(payload).await.is_err() {
                        debug!("Read receipt output channel closed");
                        break;
                    }
                }
                Tick::IdleNotice => {
                    debug!(conversation_id = %self.conversation_id, "Aggregator idle");
                    let notice = PushPayload::idle_notice(self.conversation_id.clone());
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break,
                        sent = output.send(notice) => {
                            if sent.is_err() {
                                debug!("Read receipt output channel closed");
                                break;
                            }
                        }
                    }
                }
                Tick::Wait => {}
            }
        }

        debug!(conversation_id = %self.conversation_id, "Aggregator stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use test_case::test_case;
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::domain::entities::{ChatType, ContentType, MessageId, UserId};

    fn receipt(message_id: &str) -> PushPayload {
        PushPayload {
            conversation_id: "g1".into(),
            chat_type: ChatType::Group,
            send_id: UserId::default(),
            recv_id: "g1".into(),
            recv_ids: Vec::new(),
            send_time: 0,
            content_type: ContentType::MarkRead,
            read_records: BTreeMap::from([(MessageId::from(message_id), "AQ==".to_string())]),
            msg_id: None,
            message_type: None,
            content: None,
        }
    }

    fn config() -> AggregatorConfig {
        AggregatorConfig::new(Duration::from_secs(1), 10)
    }

    #[test_case(Duration::from_secs(1), 10, Duration::from_millis(250) ; "default delay")]
    #[test_case(Duration::from_secs(8), 10, Duration::from_secs(1) ; "capped at one second")]
    #[test_case(Duration::from_millis(2), 10, Duration::from_millis(1) ; "floored at one millisecond")]
    fn test_poll_interval(delay: Duration, count: usize, expected: Duration) {
        assert_eq!(AggregatorConfig::new(delay, count).poll_interval(), expected);
    }

    #[test]
    fn test_zero_thresholds_keep_defaults() {
        assert_eq!(
            AggregatorConfig::new(Duration::ZERO, 0),
            AggregatorConfig::default()
        );
        assert_eq!(config().idle_window(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_by_count() {
        let (tx, mut rx) = mpsc::channel(8);
        let started = Instant::now();
        let aggregator = ReadReceiptAggregator::spawn(receipt("m0"), config(), tx);
        for i in 1..10 {
            aggregator.merge_push(receipt(&format!("m{i}")));
        }
        assert_eq!(aggregator.merge_count(), 10);
        assert_eq!(aggregator.state(), AggregatorState::Accumulating);

        let flushed = rx.recv().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(flushed.read_records.len(), 10);
        assert_eq!(aggregator.merge_count(), 0);
        assert_eq!(aggregator.state(), AggregatorState::Empty);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        aggregator.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_by_time() {
        let (tx, mut rx) = mpsc::channel(8);
        let started = Instant::now();
        let aggregator = ReadReceiptAggregator::spawn(receipt("m0"), config(), tx);
        aggregator.merge_push(receipt("m1"));

        let flushed = rx.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(
            flushed.read_records.keys().cloned().collect::<Vec<_>>(),
            vec![MessageId::from("m0"), MessageId::from("m1")]
        );
        aggregator.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_snapshot_wins() {
        let (tx, mut rx) = mpsc::channel(8);
        let aggregator = ReadReceiptAggregator::spawn(receipt("m0"), config(), tx);
        let mut newer = receipt("m0");
        newer.read_records.insert("m0".into(), "Aw==".to_string());
        aggregator.merge_push(newer);

        let flushed = rx.recv().await.unwrap();
        assert_eq!(flushed.read_records[&MessageId::from("m0")], "Aw==");
        aggregator.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_notice_after_quiet_period() {
        let (tx, mut rx) = mpsc::channel(8);
        let aggregator = ReadReceiptAggregator::spawn(receipt("m0"), config(), tx);

        let flushed = rx.recv().await.unwrap();
        assert!(!flushed.is_empty());
        assert!(!aggregator.is_idle());

        let flushed_at = Instant::now();
        let notice = rx.recv().await.unwrap();
        assert!(flushed_at.elapsed() >= Duration::from_secs(2));
        assert!(notice.is_empty());
        assert_eq!(notice.conversation_id.as_str(), "g1");
        assert!(aggregator.is_idle());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        aggregator.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_after_idle_notice_resumes() {
        let (tx, mut rx) = mpsc::channel(8);
        let aggregator = ReadReceiptAggregator::spawn(receipt("m0"), config(), tx);
        rx.recv().await.unwrap();
        assert!(rx.recv().await.unwrap().is_empty());

        aggregator.merge_push(receipt("m5"));
        assert!(!aggregator.is_idle());
        let flushed = rx.recv().await.unwrap();
        assert!(flushed.read_records.contains_key(&MessageId::from("m5")));
        aggregator.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_blocked_flush_still_delivers() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(receipt("m-queued")).await.unwrap();
        let aggregator = ReadReceiptAggregator::spawn(receipt("m0"), config(), tx);
        for i in 1..10 {
            aggregator.merge_push(receipt(&format!("m{i}")));
        }

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(aggregator.merge_count(), 0);
        assert!(aggregator.clear().is_none());

        assert!(rx.recv().await.unwrap().read_records.contains_key(&MessageId::from("m-queued")));
        assert_eq!(rx.recv().await.unwrap().read_records.len(), 10);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_is_idempotent() {
        let (tx, mut rx) = mpsc::channel(8);
        let aggregator = ReadReceiptAggregator::spawn(receipt("m0"), config(), tx);

        let pending = aggregator.clear();
        assert_eq!(pending.map(|p| p.read_records.len()), Some(1));
        assert!(aggregator.clear().is_none());
        assert_eq!(aggregator.state(), AggregatorState::Retired);

        // The timing task dropped its sender on exit.
        assert!(rx.recv().await.is_none());
    }
}
