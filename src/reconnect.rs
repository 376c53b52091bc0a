//! Automatic reconnection with exponential backoff.
//!
//! [`ReconnectManager`] is consulted by `Client::poll()` while the session
//! is disconnected. It decides when the next attempt is due and which
//! server to try, rotating through fallbacks after the first attempt.

use std::fmt;

use tracing::debug;

/// Upper bound on the backoff delay.
pub const MAX_RECONNECT_DELAY_SECS: u64 = 300;

/// Where to connect.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
        }
    }

    /// Plaintext on 6667.
    pub fn plain(host: impl Into<String>) -> Self {
        Self::new(host, 6667, false)
    }

    /// TLS on 6697.
    pub fn tls(host: impl Into<String>) -> Self {
        Self::new(host, 6697, true)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tls {
            write!(f, "{}:+{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Reconnect settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReconnectConfig {
    pub enabled: bool,
    /// Delay before the first retry, doubled per attempt. At least 1.
    pub base_delay_secs: u64,
    /// Negative means unlimited.
    pub max_attempts: i32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_delay_secs: 5,
            max_attempts: -1,
        }
    }
}

/// A reconnect the client should perform now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Wait before the attempt after this one.
    pub delay_secs: u64,
    pub target: ServerAddress,
}

/// Backoff delay for a 1-based attempt number.
pub fn scheduled_delay_secs(base_delay_secs: u64, attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(32);
    base_delay_secs
        .saturating_mul(1u64 << exponent)
        .min(MAX_RECONNECT_DELAY_SECS)
}

/// Backoff and server rotation state.
#[derive(Clone, Debug, Default)]
pub struct ReconnectManager {
    config: ReconnectConfig,
    primary: Option<ServerAddress>,
    fallbacks: Vec<ServerAddress>,
    attempts: u32,
    next_attempt_at: u64,
    /// Next fallback to try; equal to `fallbacks.len()` means the primary.
    index: usize,
}

impl ReconnectManager {
    pub fn new(config: ReconnectConfig) -> Self {
        let mut manager = Self::default();
        manager.set_config(config);
        manager
    }

    pub fn config(&self) -> ReconnectConfig {
        self.config
    }

    pub fn set_config(&mut self, config: ReconnectConfig) {
        self.set_enabled(config.enabled);
        self.set_base_delay(config.base_delay_secs);
        self.config.max_attempts = config.max_attempts;
    }

    /// Disabling also forgets the attempt count.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
        if !enabled {
            self.attempts = 0;
            self.next_attempt_at = 0;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn set_base_delay(&mut self, secs: u64) {
        self.config.base_delay_secs = secs.max(1);
    }

    pub fn set_max_attempts(&mut self, max: i32) {
        self.config.max_attempts = max;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Remember the server the host asked for.
    pub fn set_primary(&mut self, target: ServerAddress) {
        self.primary = Some(target);
    }

    pub fn primary(&self) -> Option<&ServerAddress> {
        self.primary.as_ref()
    }

    pub fn add_fallback(&mut self, server: ServerAddress) {
        self.fallbacks.push(server);
    }

    pub fn clear_fallbacks(&mut self) {
        self.fallbacks.clear();
        self.index = 0;
    }

    pub fn fallbacks(&self) -> &[ServerAddress] {
        &self.fallbacks
    }

    /// Registration succeeded: start over from the primary next time.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.next_attempt_at = 0;
        self.index = 0;
    }

    /// The next attempt, if one is due at `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> Option<ReconnectAttempt> {
        if !self.config.enabled {
            return None;
        }
        let primary = self.primary.clone()?;
        if let Ok(max) = u32::try_from(self.config.max_attempts) {
            if self.attempts >= max {
                return None;
            }
        }
        if now_ms < self.next_attempt_at {
            return None;
        }

        self.attempts += 1;
        let delay_secs = scheduled_delay_secs(self.config.base_delay_secs, self.attempts);
        self.next_attempt_at = now_ms.saturating_add(delay_secs.saturating_mul(1000));

        let target = if self.attempts > 1 && !self.fallbacks.is_empty() {
            let target = self
                .fallbacks
                .get(self.index)
                .cloned()
                .unwrap_or(primary);
            self.index = (self.index + 1) % (self.fallbacks.len() + 1);
            target
        } else {
            primary
        };

        debug!(attempt = self.attempts, delay_secs, %target, "reconnect due");
        Some(ReconnectAttempt {
            attempt: self.attempts,
            delay_secs,
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(base: u64, max: i32) -> ReconnectManager {
        let mut manager = ReconnectManager::new(ReconnectConfig {
            enabled: true,
            base_delay_secs: base,
            max_attempts: max,
        });
        manager.set_primary(ServerAddress::tls("primary.example"));
        manager
    }

    #[test]
    fn test_backoff_schedule() {
        let delays: Vec<_> = (1..=8).map(|n| scheduled_delay_secs(5, n)).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 300, 300]);
        assert_eq!(scheduled_delay_secs(1, 100), 300);
    }

    #[test]
    fn test_waits_for_delay() {
        let mut manager = manager(5, -1);
        let first = manager.poll(0).unwrap();
        assert_eq!(first.attempt, 1);
        assert_eq!(first.delay_secs, 5);
        assert!(manager.poll(4_999).is_none());
        let second = manager.poll(5_000).unwrap();
        assert_eq!(second.delay_secs, 10);
        assert!(manager.poll(14_999).is_none());
        assert!(manager.poll(15_000).is_some());
    }

    #[test]
    fn test_max_attempts() {
        let mut manager = manager(1, 2);
        assert!(manager.poll(0).is_some());
        assert!(manager.poll(10_000).is_some());
        assert!(manager.poll(1_000_000).is_none());
        manager.set_enabled(false);
        manager.set_enabled(true);
        assert!(manager.poll(1_000_000).is_some());
    }

    #[test]
    fn test_fallback_rotation_wraps_to_primary() {
        let mut manager = manager(1, -1);
        manager.add_fallback(ServerAddress::plain("fb1.example"));
        manager.add_fallback(ServerAddress::plain("fb2.example"));

        let hosts: Vec<String> = (0..6)
            .map(|i| manager.poll(i * 1_000_000).unwrap().target.host)
            .collect();
        assert_eq!(
            hosts,
            vec![
                "primary.example",
                "fb1.example",
                "fb2.example",
                "primary.example",
                "fb1.example",
                "fb2.example",
            ]
        );
    }

    #[test]
    fn test_connected_resets() {
        let mut manager = manager(5, -1);
        manager.add_fallback(ServerAddress::plain("fb.example"));
        manager.poll(0);
        manager.poll(5_000);
        assert_eq!(manager.attempts(), 2);
        manager.on_connected();
        assert_eq!(manager.attempts(), 0);
        let next = manager.poll(5_001).unwrap();
        assert_eq!(next.target.host, "primary.example");
        assert_eq!(next.delay_secs, 5);
    }

    #[test]
    fn test_disabled_or_no_target() {
        let mut manager = ReconnectManager::new(ReconnectConfig::default());
        manager.set_primary(ServerAddress::plain("a"));
        assert!(manager.poll(0).is_none());
        let mut manager = ReconnectManager::new(ReconnectConfig {
            enabled: true,
            ..ReconnectConfig::default()
        });
        assert!(manager.poll(0).is_none());
    }

    #[test]
    fn test_base_delay_minimum() {
        let mut manager = ReconnectManager::default();
        manager.set_base_delay(0);
        assert_eq!(manager.config().base_delay_secs, 1);
    }
}
