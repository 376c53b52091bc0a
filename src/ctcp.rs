//! CTCP (Client-to-Client Protocol) framing.
//!
//! CTCP payloads ride inside PRIVMSG and NOTICE text, wrapped in `\x01`
//! bytes. The first word is the CTCP command, the rest its parameters.
//!
//! # Example
//!
//! ```
//! use slirc_client::ctcp::{encode_ctcp, Ctcp, CtcpKind};
//!
//! let text = encode_ctcp("action", "waves hello");
//! assert_eq!(text, "\x01ACTION waves hello\x01");
//!
//! let ctcp = Ctcp::parse(&text).unwrap();
//! assert_eq!(ctcp.kind(), CtcpKind::Action);
//! assert_eq!(ctcp.params, "waves hello");
//! ```

use std::fmt;

/// The CTCP delimiter character.
pub const CTCP_DELIM: char = '\x01';

/// CTCP commands the client engine reacts to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CtcpKind {
    /// `/me` style action.
    Action,
    /// Client version query.
    Version,
    /// Round-trip probe; replies echo the parameters.
    Ping,
    /// Local time query.
    Time,
    /// DCC session setup.
    Dcc,
    /// Anything else.
    Unknown(String),
}

impl CtcpKind {
    /// Classify a command name, case-insensitively.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ACTION" => Self::Action,
            "VERSION" => Self::Version,
            "PING" => Self::Ping,
            "TIME" => Self::Time,
            "DCC" => Self::Dcc,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Canonical command name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "ACTION",
            Self::Version => "VERSION",
            Self::Ping => "PING",
            Self::Time => "TIME",
            Self::Dcc => "DCC",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for CtcpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A borrowed CTCP payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// Command as sent (not case-normalized).
    pub command: &'a str,
    /// Everything after the first space, possibly empty.
    pub params: &'a str,
}

impl<'a> Ctcp<'a> {
    /// Unwrap `\x01COMMAND params\x01`.
    ///
    /// Requires both delimiters and a non-empty command.
    pub fn parse(text: &'a str) -> Option<Self> {
        if !is_ctcp(text) {
            return None;
        }
        let inner = &text[1..text.len() - 1];
        let (command, params) = inner.split_once(' ').unwrap_or((inner, ""));
        if command.is_empty() {
            return None;
        }
        Some(Ctcp { command, params })
    }

    /// Classified command.
    pub fn kind(&self) -> CtcpKind {
        CtcpKind::parse(self.command)
    }
}

impl fmt::Display for Ctcp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_ctcp(self.command, self.params))
    }
}

/// True if `text` is wrapped in CTCP delimiters.
pub fn is_ctcp(text: &str) -> bool {
    text.len() >= 2 && text.starts_with(CTCP_DELIM) && text.ends_with(CTCP_DELIM)
}

/// Wrap a command and parameters in CTCP delimiters, upper-casing the command.
pub fn encode_ctcp(command: &str, params: &str) -> String {
    let command = command.to_ascii_uppercase();
    if params.is_empty() {
        format!("{CTCP_DELIM}{command}{CTCP_DELIM}")
    } else {
        format!("{CTCP_DELIM}{command} {params}{CTCP_DELIM}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_params() {
        let ctcp = Ctcp::parse("\x01PING 1700000000\x01").unwrap();
        assert_eq!(ctcp.command, "PING");
        assert_eq!(ctcp.params, "1700000000");
        assert_eq!(ctcp.kind(), CtcpKind::Ping);
    }

    #[test]
    fn test_parse_without_params() {
        let ctcp = Ctcp::parse("\x01version\x01").unwrap();
        assert_eq!(ctcp.params, "");
        assert_eq!(ctcp.kind(), CtcpKind::Version);
    }

    #[test]
    fn test_rejects_unframed_text() {
        assert!(Ctcp::parse("hello").is_none());
        assert!(Ctcp::parse("\x01").is_none());
        assert!(Ctcp::parse("\x01\x01").is_none());
        assert!(Ctcp::parse("\x01ACTION unterminated").is_none());
    }

    #[test]
    fn test_encode_uppercases() {
        assert_eq!(encode_ctcp("version", ""), "\x01VERSION\x01");
        assert_eq!(
            encode_ctcp("dcc", "SEND file.txt 3232235777 5000 100"),
            "\x01DCC SEND file.txt 3232235777 5000 100\x01"
        );
    }

    #[test]
    fn test_unknown_kind_keeps_name() {
        let ctcp = Ctcp::parse("\x01CLIENTINFO\x01").unwrap();
        assert_eq!(ctcp.kind(), CtcpKind::Unknown("CLIENTINFO".to_string()));
        assert_eq!(ctcp.kind().to_string(), "CLIENTINFO");
    }
}
