//! Runtime configuration changes.
//!
//! Each setter updates [`ClientConfig`](super::ClientConfig) and the
//! component that acts on it, so the change survives reconnects.

use std::net::IpAddr;

use tracing::warn;

use super::{AutoJoinChannel, Client};
use crate::encoding::TextEncoding;
use crate::reconnect::{ReconnectConfig, ServerAddress};
use crate::sasl::SaslConfig;
use crate::scheduler::FloodControl;

impl Client {
    pub fn set_flood_control(&mut self, flood: FloodControl) {
        self.config.flood_control = flood;
        self.scheduler.set_flood_control(flood);
    }

    pub fn set_ping_timeout(&mut self, secs: u64) {
        self.config.ping_timeout_secs = secs;
    }

    /// Change the text encoding of the link. Switching away from UTF-8
    /// turns auto-detection off.
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.config.encoding = encoding;
        self.decoder.set_encoding(encoding);
        if encoding != TextEncoding::Utf8 {
            self.set_auto_detect_encoding(false);
        }
    }

    pub fn set_auto_detect_encoding(&mut self, enabled: bool) {
        self.config.auto_detect_encoding = enabled;
        self.decoder.set_auto_detect(enabled);
    }

    /// Encoding currently used on the wire, after any detection.
    pub fn encoding(&self) -> TextEncoding {
        self.decoder.encoding()
    }

    /// Turn history on or off. Turning it off keeps what was collected.
    pub fn set_history_enabled(&mut self, enabled: bool) {
        self.config.history_enabled = enabled;
    }

    pub fn set_max_history(&mut self, max: usize) {
        self.config.max_history = max;
        while self.history.len() > max {
            self.history.pop_front();
        }
    }

    pub fn set_alt_nicks(&mut self, nicks: Vec<String>) {
        self.config.alt_nicks = nicks;
        self.alt_nick_index = 0;
    }

    /// Add or replace an autojoin entry.
    pub fn add_autojoin(&mut self, channel: &str, key: Option<&str>) {
        let entry = AutoJoinChannel::new(channel, key.map(str::to_owned));
        match self.config.autojoin.iter_mut().find(|e| e.channel == channel) {
            Some(existing) => *existing = entry,
            None => self.config.autojoin.push(entry),
        }
    }

    pub fn remove_autojoin(&mut self, channel: &str) {
        self.config.autojoin.retain(|e| e.channel != channel);
    }

    pub fn set_autojoin_enabled(&mut self, enabled: bool) {
        self.config.autojoin_enabled = enabled;
    }

    pub fn add_fallback_server(&mut self, server: ServerAddress) {
        self.reconnect.add_fallback(server.clone());
        self.config.fallback_servers.push(server);
    }

    pub fn clear_fallback_servers(&mut self) {
        self.reconnect.clear_fallbacks();
        self.config.fallback_servers.clear();
    }

    pub fn set_reconnect(&mut self, reconnect: ReconnectConfig) {
        self.reconnect.set_config(reconnect);
        self.config.reconnect = self.reconnect.config();
    }

    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        self.reconnect.set_enabled(enabled);
        self.config.reconnect = self.reconnect.config();
    }

    /// Base reconnect delay; values below one second are raised to one.
    pub fn set_reconnect_delay(&mut self, secs: u64) {
        self.reconnect.set_base_delay(secs);
        self.config.reconnect = self.reconnect.config();
    }

    /// `-1` retries forever.
    pub fn set_max_reconnect_attempts(&mut self, max: i32) {
        self.reconnect.set_max_attempts(max);
        self.config.reconnect = self.reconnect.config();
    }

    pub fn set_dcc_local_ip(&mut self, ip: Option<IpAddr>) {
        self.config.dcc_local_ip = ip;
    }

    /// Credentials used at the next registration.
    pub fn set_sasl(&mut self, sasl: Option<SaslConfig>) {
        self.caps.set_sasl(sasl.clone());
        self.config.sasl = sasl;
    }

    pub fn disable_sasl(&mut self) {
        self.set_sasl(None);
    }

    /// Pick credentials by mechanism name. Only PLAIN and EXTERNAL are
    /// supported; SCRAM names fall back to PLAIN.
    pub fn set_sasl_mechanism(&mut self, mechanism: &str, username: &str, password: &str) {
        let upper = mechanism.to_ascii_uppercase();
        let sasl = match upper.as_str() {
            "EXTERNAL" => SaslConfig::External,
            "PLAIN" => SaslConfig::plain(username, password),
            other => {
                if other.starts_with("SCRAM-") {
                    warn!(mechanism = other, "SCRAM is not supported, using PLAIN");
                } else {
                    warn!(mechanism = other, "unknown SASL mechanism, using PLAIN");
                }
                SaslConfig::plain(username, password)
            }
        };
        self.set_sasl(Some(sasl));
    }

    /// Replace the capability request list for the next negotiation.
    pub fn set_request_caps(&mut self, caps: Vec<String>) {
        self.caps.set_requested(caps.clone());
        self.config.request_caps = caps;
    }
}
