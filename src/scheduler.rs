//! Outbound pacing.
//!
//! Every line the client sends goes through a [`Scheduler`]: a
//! priority-ordered [`OutboundQueue`], a [`TokenBucket`] for bursts and a
//! [`Pacer`] enforcing a minimum gap between sends. The session drains it
//! once per `poll()`.
//!
//! # Example
//!
//! ```
//! use slirc_client::scheduler::{FloodControl, Scheduler, PRIORITY_NORMAL, PRIORITY_URGENT};
//!
//! let mut scheduler = Scheduler::new(FloodControl::default());
//! scheduler.enqueue("PRIVMSG #a :one", PRIORITY_NORMAL);
//! scheduler.enqueue("PONG :token", PRIORITY_URGENT);
//!
//! assert_eq!(scheduler.drain(0).as_deref(), Some("PONG :token"));
//! assert_eq!(scheduler.drain(0).as_deref(), Some("PRIVMSG #a :one"));
//! ```

use std::collections::VecDeque;

use tracing::trace;

/// Priority of protocol-mandated replies such as `PONG`.
pub const PRIORITY_URGENT: i32 = 100;
/// Priority of everything else.
pub const PRIORITY_NORMAL: i32 = 0;

/// Flood control settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FloodControl {
    /// Token bucket capacity.
    pub burst: u32,
    /// Tokens added per second.
    pub refill_per_second: u32,
    /// Upper bound on steady-state send rate; 0 disables the spacing gate.
    pub messages_per_second: u32,
}

impl Default for FloodControl {
    fn default() -> Self {
        Self {
            burst: 5,
            refill_per_second: 1,
            messages_per_second: 0,
        }
    }
}

/// A line waiting to be sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedMessage {
    pub line: String,
    pub priority: i32,
}

/// FIFO within priority, higher priority first.
#[derive(Clone, Debug, Default)]
pub struct OutboundQueue {
    items: VecDeque<QueuedMessage>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert before the first item with strictly lower priority.
    pub fn push(&mut self, line: impl Into<String>, priority: i32) {
        let item = QueuedMessage {
            line: line.into(),
            priority,
        };
        match self.items.iter().position(|q| q.priority < priority) {
            Some(index) => self.items.insert(index, item),
            None => self.items.push_back(item),
        }
    }

    pub fn pop(&mut self) -> Option<QueuedMessage> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&QueuedMessage> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.items.iter()
    }
}

/// Whole-token bucket refilled at a fixed interval.
#[derive(Clone, Debug)]
pub struct TokenBucket {
    capacity: u32,
    tokens: u32,
    refill_interval_ms: u64,
    last_refill: Option<u64>,
}

impl TokenBucket {
    /// A full bucket.
    pub fn new(capacity: u32, refill_per_second: u32) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_interval_ms: 1000 / u64::from(refill_per_second.max(1)),
            last_refill: None,
        }
    }

    /// Add one token per whole interval elapsed since the last refill.
    ///
    /// The first call only records the time.
    pub fn refill(&mut self, now_ms: u64) {
        let Some(last) = self.last_refill else {
            self.last_refill = Some(now_ms);
            return;
        };

        let due = now_ms.saturating_sub(last) / self.refill_interval_ms.max(1);
        if due > 0 {
            let added = u32::try_from(due).unwrap_or(u32::MAX);
            self.tokens = self.tokens.saturating_add(added).min(self.capacity);
            self.last_refill = Some(last + due * self.refill_interval_ms);
        }
    }

    pub fn try_take(&mut self) -> bool {
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// Minimum spacing between consecutive sends.
#[derive(Clone, Debug, Default)]
pub struct Pacer {
    min_interval_ms: u64,
    last_send: Option<u64>,
}

impl Pacer {
    /// `messages_per_second` of 0 never blocks.
    pub fn new(messages_per_second: u32) -> Self {
        Self {
            min_interval_ms: if messages_per_second == 0 {
                0
            } else {
                1000 / u64::from(messages_per_second)
            },
            last_send: None,
        }
    }

    pub fn ready(&self, now_ms: u64) -> bool {
        match self.last_send {
            Some(last) => now_ms.saturating_sub(last) >= self.min_interval_ms,
            None => true,
        }
    }

    pub fn record(&mut self, now_ms: u64) {
        self.last_send = Some(now_ms);
    }
}

/// Queue plus rate limits.
#[derive(Clone, Debug)]
pub struct Scheduler {
    queue: OutboundQueue,
    bucket: TokenBucket,
    pacer: Pacer,
    flood: FloodControl,
}

impl Scheduler {
    pub fn new(flood: FloodControl) -> Self {
        Self {
            queue: OutboundQueue::new(),
            bucket: TokenBucket::new(flood.burst, flood.refill_per_second),
            pacer: Pacer::new(flood.messages_per_second),
            flood,
        }
    }

    pub fn flood_control(&self) -> FloodControl {
        self.flood
    }

    /// Replace the rate limits, keeping queued lines.
    pub fn set_flood_control(&mut self, flood: FloodControl) {
        self.flood = flood;
        self.bucket = TokenBucket::new(flood.burst, flood.refill_per_second);
        self.pacer = Pacer::new(flood.messages_per_second);
    }

    pub fn enqueue(&mut self, line: impl Into<String>, priority: i32) {
        self.queue.push(line, priority);
    }

    /// Release at most one line if both gates allow it.
    pub fn drain(&mut self, now_ms: u64) -> Option<String> {
        if self.queue.is_empty() {
            return None;
        }

        self.bucket.refill(now_ms);
        if self.bucket.tokens() == 0 || !self.pacer.ready(now_ms) {
            trace!(queued = self.queue.len(), "send deferred");
            return None;
        }

        let item = self.queue.pop()?;
        self.bucket.try_take();
        self.pacer.record(now_ms);
        Some(item.line)
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn tokens(&self) -> u32 {
        self.bucket.tokens()
    }

    /// Drop queued lines. Token state is kept.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(FloodControl::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_fifo_within_priority() {
        let mut queue = OutboundQueue::new();
        queue.push("a", 0);
        queue.push("b", 0);
        queue.push("urgent", 100);
        queue.push("c", 0);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|q| (q.priority, q.line))
            .collect();
        assert_eq!(
            order,
            vec![
                (100, "urgent".to_string()),
                (0, "a".to_string()),
                (0, "b".to_string()),
                (0, "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_equal_urgent_keep_order() {
        let mut queue = OutboundQueue::new();
        queue.push("PONG :1", 100);
        queue.push("PONG :2", 100);
        assert_eq!(queue.pop().unwrap().line, "PONG :1");
        assert_eq!(queue.pop().unwrap().line, "PONG :2");
    }

    #[test]
    fn test_bucket_first_refill_initializes() {
        let mut bucket = TokenBucket::new(5, 1);
        for _ in 0..5 {
            assert!(bucket.try_take());
        }
        bucket.refill(10_000);
        assert_eq!(bucket.tokens(), 0);
        bucket.refill(12_500);
        assert_eq!(bucket.tokens(), 2);
        // The half second left over still counts toward the next token.
        bucket.refill(13_000);
        assert_eq!(bucket.tokens(), 3);
    }

    #[test]
    fn test_bucket_never_exceeds_capacity() {
        let mut bucket = TokenBucket::new(5, 1);
        bucket.refill(0);
        bucket.refill(60_000);
        assert_eq!(bucket.tokens(), 5);
    }

    #[test]
    fn test_burst_then_deferred() {
        let mut scheduler = Scheduler::default();
        for i in 0..6 {
            scheduler.enqueue(format!("PRIVMSG #c :{i}"), PRIORITY_NORMAL);
        }
        for i in 0..5 {
            assert_eq!(scheduler.drain(0), Some(format!("PRIVMSG #c :{i}")));
        }
        assert_eq!(scheduler.drain(0), None);
        assert_eq!(scheduler.drain(999), None);
        assert_eq!(scheduler.drain(1000).as_deref(), Some("PRIVMSG #c :5"));
    }

    #[test]
    fn test_pacer_spacing() {
        let mut scheduler = Scheduler::new(FloodControl {
            burst: 5,
            refill_per_second: 1,
            messages_per_second: 2,
        });
        scheduler.enqueue("one", 0);
        scheduler.enqueue("two", 0);
        assert_eq!(scheduler.drain(0).as_deref(), Some("one"));
        assert_eq!(scheduler.drain(499), None);
        assert_eq!(scheduler.drain(500).as_deref(), Some("two"));
    }

    #[test]
    fn test_empty_drain() {
        let mut scheduler = Scheduler::default();
        assert_eq!(scheduler.drain(0), None);
        assert_eq!(scheduler.tokens(), 5);
    }
}
