//! Strict Transport Security policies.
//!
//! A server advertising `sts=port=6697,duration=2592000` asks clients to
//! reconnect with TLS on that port and keep doing so for `duration`
//! seconds. The shorter positional form `sts=6697,2592000[,preload]` is
//! also accepted.

use std::collections::HashMap;

use tracing::{debug, warn};

/// One cached policy.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StsPolicy {
    /// TLS port to use.
    pub port: u16,
    /// Lifetime in seconds, as advertised.
    pub duration: u64,
    /// The server asked to be preloaded.
    pub preload: bool,
    /// Unix time after which the policy no longer applies.
    pub expires_at: u64,
}

impl StsPolicy {
    /// Parse an `sts` capability value received at unix time `now`.
    ///
    /// Returns `None` when neither port nor duration can be read.
    pub fn parse(value: &str, now: u64) -> Option<Self> {
        let mut port = None;
        let mut duration = None;
        let mut preload = false;

        for (index, item) in value.split(',').enumerate() {
            match item.split_once('=') {
                Some(("port", v)) => port = v.parse().ok(),
                Some(("duration", v)) => duration = v.parse().ok(),
                Some(_) => {}
                None if item == "preload" => preload = true,
                None if index == 0 => port = item.parse().ok(),
                None if index == 1 => duration = item.parse().ok(),
                None => {}
            }
        }

        let duration = duration?;
        Some(StsPolicy {
            port: port.unwrap_or(0),
            duration,
            preload,
            expires_at: now.saturating_add(duration),
        })
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Policies keyed by hostname. Survives disconnects.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StsCache {
    policies: HashMap<String, StsPolicy>,
}

impl StsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a policy advertised by `host`.
    ///
    /// A zero duration removes any cached policy. A policy without a port
    /// only refreshes the expiry of an existing one.
    pub fn update(&mut self, host: &str, value: &str, now: u64) {
        let Some(policy) = StsPolicy::parse(value, now) else {
            warn!(host, value, "unparsable sts policy");
            return;
        };

        if policy.duration == 0 {
            debug!(host, "sts policy withdrawn");
            self.policies.remove(host);
            return;
        }

        match self.policies.get_mut(host) {
            Some(existing) if policy.port == 0 => {
                existing.duration = policy.duration;
                existing.expires_at = policy.expires_at;
            }
            _ if policy.port == 0 => {
                debug!(host, "sts policy without port ignored");
            }
            _ => {
                debug!(host, port = policy.port, duration = policy.duration, "sts policy cached");
                self.policies.insert(host.to_owned(), policy);
            }
        }
    }

    /// The unexpired policy for `host`, if any.
    pub fn get(&self, host: &str, now: u64) -> Option<&StsPolicy> {
        self.policies.get(host).filter(|p| !p.is_expired(now))
    }

    pub fn contains(&self, host: &str, now: u64) -> bool {
        self.get(host, now).is_some()
    }

    pub fn remove(&mut self, host: &str) -> bool {
        self.policies.remove(host).is_some()
    }

    pub fn clear(&mut self) {
        self.policies.clear();
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value_form() {
        let policy = StsPolicy::parse("port=6697,duration=300,preload", 1000).unwrap();
        assert_eq!(policy.port, 6697);
        assert_eq!(policy.duration, 300);
        assert!(policy.preload);
        assert_eq!(policy.expires_at, 1300);
    }

    #[test]
    fn test_parse_positional_form() {
        let policy = StsPolicy::parse("6697,2592000", 0).unwrap();
        assert_eq!(policy.port, 6697);
        assert_eq!(policy.duration, 2592000);
        assert!(!policy.preload);
    }

    #[test]
    fn test_parse_rejects_missing_duration() {
        assert!(StsPolicy::parse("port=6697", 0).is_none());
        assert!(StsPolicy::parse("garbage", 0).is_none());
    }

    #[test]
    fn test_cache_expiry() {
        let mut cache = StsCache::new();
        cache.update("irc.example.net", "port=6697,duration=60", 100);
        assert!(cache.contains("irc.example.net", 159));
        assert!(!cache.contains("irc.example.net", 160));
        assert!(!cache.contains("other.example.net", 100));
    }

    #[test]
    fn test_zero_duration_removes() {
        let mut cache = StsCache::new();
        cache.update("irc.example.net", "port=6697,duration=60", 0);
        cache.update("irc.example.net", "duration=0", 10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_duration_only_refreshes() {
        let mut cache = StsCache::new();
        cache.update("irc.example.net", "port=6697,duration=60", 0);
        cache.update("irc.example.net", "duration=600", 50);
        let policy = cache.get("irc.example.net", 100).unwrap();
        assert_eq!(policy.port, 6697);
        assert_eq!(policy.expires_at, 650);
    }
}
