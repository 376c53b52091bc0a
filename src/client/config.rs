//! Client configuration.

use std::net::IpAddr;

use crate::caps::DEFAULT_CAPS;
use crate::encoding::TextEncoding;
use crate::reconnect::{ReconnectConfig, ServerAddress};
use crate::sasl::SaslConfig;
use crate::scheduler::FloodControl;

/// A channel joined automatically after registration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AutoJoinChannel {
    pub channel: String,
    pub key: Option<String>,
}

impl AutoJoinChannel {
    pub fn new(channel: impl Into<String>, key: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            key,
        }
    }
}

/// Everything that survives a disconnect.
///
/// All fields can also be changed at runtime through setters on
/// [`Client`](crate::Client).
///
/// ```
/// use slirc_client::ClientConfig;
///
/// let config = ClientConfig {
///     nickname: "ferris".to_string(),
///     alt_nicks: vec!["ferris_".to_string()],
///     ..ClientConfig::default()
/// };
/// assert_eq!(config.username, "slirc");
/// assert!(config.request_caps.iter().any(|c| c == "sasl"));
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    pub nickname: String,
    pub username: String,
    pub realname: String,
    /// Server password, sent as `PASS` during registration.
    pub password: Option<String>,
    /// Tried in order when the server answers 433.
    pub alt_nicks: Vec<String>,
    pub request_caps: Vec<String>,
    pub sasl: Option<SaslConfig>,
    pub flood_control: FloodControl,
    /// Seconds without any received byte before the link is declared dead.
    pub ping_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
    pub autojoin: Vec<AutoJoinChannel>,
    pub autojoin_enabled: bool,
    pub fallback_servers: Vec<ServerAddress>,
    /// `*`/`?` masks matched against the sender nick and full prefix.
    pub ignore_masks: Vec<String>,
    /// Extra words that trigger [`Event::Highlighted`](crate::Event::Highlighted).
    pub highlight_patterns: Vec<String>,
    pub history_enabled: bool,
    pub max_history: usize,
    /// How many `msgid` -> text entries are remembered for replies.
    pub max_tracked_messages: usize,
    pub encoding: TextEncoding,
    pub auto_detect_encoding: bool,
    /// Set user mode `+B` after registration.
    pub bot_mode: bool,
    /// Address advertised in outgoing DCC offers. Falls back to the
    /// transport's local address.
    pub dcc_local_ip: Option<IpAddr>,
    /// Answer to CTCP VERSION.
    pub version_reply: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nickname: "slirc".to_owned(),
            username: "slirc".to_owned(),
            realname: "slirc-client user".to_owned(),
            password: None,
            alt_nicks: Vec::new(),
            request_caps: DEFAULT_CAPS.iter().map(|&c| c.to_owned()).collect(),
            sasl: None,
            flood_control: FloodControl::default(),
            ping_timeout_secs: 300,
            reconnect: ReconnectConfig::default(),
            autojoin: Vec::new(),
            autojoin_enabled: true,
            fallback_servers: Vec::new(),
            ignore_masks: Vec::new(),
            highlight_patterns: Vec::new(),
            history_enabled: false,
            max_history: 1000,
            max_tracked_messages: 1000,
            encoding: TextEncoding::Utf8,
            auto_detect_encoding: true,
            bot_mode: false,
            dcc_local_ip: None,
            version_reply: concat!("slirc-client ", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.ping_timeout_secs, 300);
        assert_eq!(config.flood_control.burst, 5);
        assert!(!config.reconnect.enabled);
        assert!(config.autojoin_enabled);
        assert_eq!(config.max_history, 1000);
        assert_eq!(config.request_caps.len(), DEFAULT_CAPS.len());
        assert!(config.version_reply.starts_with("slirc-client"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"nickname":"ferris","bot_mode":true}"#).unwrap();
        assert_eq!(config.nickname, "ferris");
        assert!(config.bot_mode);
        assert_eq!(config.username, "slirc");
    }
}
