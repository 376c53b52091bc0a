//! SASL authentication payloads for IRC.
//!
//! Only PLAIN and EXTERNAL are implemented. The exchange itself is driven
//! by [`CapNegotiator`](crate::caps::CapNegotiator); this module builds the
//! `AUTHENTICATE` lines.
//!
//! # Reference
//! - IRCv3 SASL: <https://ircv3.net/specs/extensions/sasl-3.2>
//! - RFC 4616 (PLAIN): <https://tools.ietf.org/html/rfc4616>
//!
//! # Example
//!
//! ```
//! use slirc_client::sasl::{authenticate_lines, encode_plain};
//!
//! let payload = encode_plain("alice", "secret");
//! let lines = authenticate_lines(&payload);
//! assert_eq!(lines, vec![format!("AUTHENTICATE {payload}")]);
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Maximum length of one `AUTHENTICATE` payload chunk.
pub const SASL_CHUNK_SIZE: usize = 400;

/// Mechanisms this client can perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SaslMechanism {
    /// Username and password (RFC 4616).
    Plain,
    /// TLS client certificate.
    External,
}

impl SaslMechanism {
    /// Canonical mechanism name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::External => "EXTERNAL",
        }
    }
}

impl std::fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured SASL credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SaslConfig {
    /// PLAIN with the account doubling as authorization identity.
    Plain {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// EXTERNAL; the server identifies us by certificate.
    External,
}

impl SaslConfig {
    /// PLAIN credentials.
    pub fn plain(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Plain {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Mechanism used by these credentials.
    pub fn mechanism(&self) -> SaslMechanism {
        match self {
            Self::Plain { .. } => SaslMechanism::Plain,
            Self::External => SaslMechanism::External,
        }
    }

    /// Base64 response to the server's `AUTHENTICATE +` prompt.
    pub fn response(&self) -> String {
        match self {
            Self::Plain { username, password } => encode_plain(username, password),
            Self::External => "+".to_owned(),
        }
    }
}

/// Encode PLAIN credentials: `authzid NUL authcid NUL password`, with the
/// username used for both identities.
pub fn encode_plain(username: &str, password: &str) -> String {
    let payload = format!("{username}\0{username}\0{password}");
    BASE64.encode(payload.as_bytes())
}

/// Split a base64 response into `AUTHENTICATE` lines.
///
/// Payloads are sent in chunks of at most [`SASL_CHUNK_SIZE`] bytes. When
/// the payload length is an exact multiple of the chunk size, a final
/// `AUTHENTICATE +` marks the end. `+` itself is sent as is.
pub fn authenticate_lines(encoded: &str) -> Vec<String> {
    if encoded == "+" || encoded.is_empty() {
        return vec!["AUTHENTICATE +".to_owned()];
    }

    // Base64 output is ASCII, so byte chunks are valid UTF-8.
    let mut lines: Vec<String> = encoded
        .as_bytes()
        .chunks(SASL_CHUNK_SIZE)
        .map(|chunk| format!("AUTHENTICATE {}", String::from_utf8_lossy(chunk)))
        .collect();

    if encoded.len() % SASL_CHUNK_SIZE == 0 {
        lines.push("AUTHENTICATE +".to_owned());
    }
    lines
}

/// Progress of the SASL exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SaslState {
    /// Not started.
    #[default]
    Idle,
    /// `AUTHENTICATE <mechanism>` sent, waiting for `AUTHENTICATE +`.
    MechanismSent(SaslMechanism),
    /// Credentials sent, waiting for a result numeric.
    CredentialsSent,
    /// 903 received.
    Succeeded,
    /// 904/905/906 received.
    Failed(String),
}

impl SaslState {
    /// True while the exchange still expects server input.
    pub fn in_progress(&self) -> bool {
        matches!(self, Self::MechanismSent(_) | Self::CredentialsSent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain_triple() {
        let encoded = encode_plain("alice", "secret");
        let decoded = BASE64.decode(&encoded).unwrap();
        assert_eq!(decoded, b"alice\0alice\0secret");
    }

    #[test]
    fn test_short_payload_single_line() {
        let lines = authenticate_lines("YWJj");
        assert_eq!(lines, vec!["AUTHENTICATE YWJj"]);
    }

    #[test]
    fn test_long_payload_chunked() {
        let payload = "A".repeat(SASL_CHUNK_SIZE + 10);
        let lines = authenticate_lines(&payload);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), "AUTHENTICATE ".len() + SASL_CHUNK_SIZE);
        assert_eq!(lines[1], format!("AUTHENTICATE {}", "A".repeat(10)));
    }

    #[test]
    fn test_exact_multiple_gets_terminator() {
        let payload = "B".repeat(SASL_CHUNK_SIZE * 2);
        let lines = authenticate_lines(&payload);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "AUTHENTICATE +");
    }

    #[test]
    fn test_external_response() {
        assert_eq!(SaslConfig::External.response(), "+");
        assert_eq!(authenticate_lines("+"), vec!["AUTHENTICATE +"]);
        assert_eq!(SaslConfig::External.mechanism().as_str(), "EXTERNAL");
    }

    #[test]
    fn test_state_progress() {
        assert!(!SaslState::Idle.in_progress());
        assert!(SaslState::MechanismSent(SaslMechanism::Plain).in_progress());
        assert!(SaslState::CredentialsSent.in_progress());
        assert!(!SaslState::Failed("bad".into()).in_progress());
    }
}
