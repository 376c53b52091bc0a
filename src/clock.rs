//! Time sources.
//!
//! The engine never reads the system clock directly. Pacing, backoff and
//! the ping watchdog use [`Clock::now_ms`]; STS expiry uses
//! [`Clock::unix_time`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of monotonic and wall-clock time.
pub trait Clock: Send {
    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;
    /// Seconds since the Unix epoch.
    fn unix_time(&self) -> u64;
}

/// The real clock.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn unix_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the client.
///
/// ```
/// use slirc_client::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_700_000_000);
/// let handle = clock.clone();
/// handle.advance_ms(1500);
/// assert_eq!(clock.now_ms(), 1500);
/// assert_eq!(clock.unix_time(), 1_700_000_001);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
    unix_base: u64,
}

impl ManualClock {
    /// Start at monotonic zero and the given Unix time.
    pub fn new(unix_base: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(0)),
            unix_base,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs.saturating_mul(1000));
    }

    pub fn set_ms(&self, ms: u64) {
        self.millis.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }

    fn unix_time(&self) -> u64 {
        self.unix_base + self.now_ms() / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(100);
        let other = clock.clone();
        other.advance_secs(3);
        assert_eq!(clock.now_ms(), 3000);
        assert_eq!(clock.unix_time(), 103);
        clock.set_ms(0);
        assert_eq!(other.now_ms(), 0);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
        assert!(clock.unix_time() > 1_600_000_000);
    }
}
