//! Connection counters.

/// A snapshot returned by [`Client::connection_stats`](crate::Client::connection_stats).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionStats {
    /// Seconds since 001, or 0 when not registered.
    pub uptime_secs: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Mean PING round trip in milliseconds, if any was measured.
    pub average_latency_ms: Option<u64>,
}

/// Running totals kept by the client.
#[derive(Clone, Debug, Default)]
pub(crate) struct Counters {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub connected_at_ms: Option<u64>,
    latency_total_ms: u64,
    latency_samples: u64,
}

impl Counters {
    pub fn record_latency(&mut self, ms: u64) {
        self.latency_total_ms = self.latency_total_ms.saturating_add(ms);
        self.latency_samples += 1;
    }

    pub fn average_latency(&self) -> Option<u64> {
        self.latency_total_ms.checked_div(self.latency_samples)
    }

    /// Zero the counters, keeping the connection time.
    pub fn reset(&mut self) {
        *self = Self {
            connected_at_ms: self.connected_at_ms,
            ..Self::default()
        };
    }

    pub fn snapshot(&self, now_ms: u64) -> ConnectionStats {
        ConnectionStats {
            uptime_secs: self
                .connected_at_ms
                .map_or(0, |at| now_ms.saturating_sub(at) / 1000),
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            average_latency_ms: self.average_latency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_average_and_reset() {
        let mut counters = Counters::default();
        assert_eq!(counters.average_latency(), None);
        counters.record_latency(100);
        counters.record_latency(50);
        assert_eq!(counters.average_latency(), Some(75));

        counters.connected_at_ms = Some(1_000);
        counters.messages_sent = 4;
        let stats = counters.snapshot(11_500);
        assert_eq!(stats.uptime_secs, 10);
        assert_eq!(stats.messages_sent, 4);

        counters.reset();
        assert_eq!(counters.messages_sent, 0);
        assert_eq!(counters.average_latency(), None);
        assert_eq!(counters.connected_at_ms, Some(1_000));
    }
}
