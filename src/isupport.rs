//! RPL_ISUPPORT (005) tracking.
//!
//! Servers advertise their features as `KEY`, `KEY=value` or `-KEY`
//! tokens spread over one or more 005 lines. [`Isupport`] keeps the
//! accumulated result for the lifetime of a connection.

use std::collections::BTreeMap;

use crate::message::Message;

/// Accumulated ISUPPORT tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Isupport {
    entries: BTreeMap<String, Option<String>>,
}

impl Isupport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one 005 line.
    ///
    /// The first parameter (our nick) and the trailing
    /// "are supported by this server" text are skipped.
    pub fn apply(&mut self, msg: &Message) {
        let mut tokens = msg.params.iter().skip(1).map(String::as_str).collect::<Vec<_>>();
        if tokens.last().is_some_and(|t| t.contains(' ')) {
            tokens.pop();
        }
        self.apply_tokens(tokens);
    }

    /// Apply raw tokens.
    pub fn apply_tokens<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) {
        for token in tokens {
            if token.is_empty() {
                continue;
            }
            if let Some(key) = token.strip_prefix('-') {
                self.entries.remove(&key.to_ascii_uppercase());
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, Some(v.to_owned())),
                None => (token, None),
            };
            self.entries.insert(key.to_ascii_uppercase(), value);
        }
    }

    /// `Some(None)` for a present token without a value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .get(&key.to_ascii_uppercase())
            .map(|v| v.as_deref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn network(&self) -> Option<&str> {
        self.get("NETWORK").flatten()
    }

    pub fn casemapping(&self) -> Option<&str> {
        self.get("CASEMAPPING").flatten()
    }

    pub fn chantypes(&self) -> &str {
        self.get("CHANTYPES").flatten().unwrap_or("#&")
    }

    /// Server requires UTF-8 traffic.
    pub fn utf8_only(&self) -> bool {
        self.contains("UTF8ONLY")
    }

    /// Supported LIST extensions, e.g. `"CMNTU"`.
    pub fn elist(&self) -> Option<&str> {
        self.get("ELIST").flatten()
    }

    /// MONITOR target limit; `Some(None)` when unlimited.
    pub fn monitor(&self) -> Option<Option<usize>> {
        self.get("MONITOR").map(|v| v.and_then(|n| n.parse().ok()))
    }

    pub fn prefix(&self) -> Option<PrefixSpec<'_>> {
        self.get("PREFIX").flatten().and_then(PrefixSpec::parse)
    }

    /// Status prefix characters in rank order; `~&@%+` when not advertised.
    pub fn prefix_chars(&self) -> &str {
        self.prefix().map_or("~&@%+", |p| p.prefixes)
    }
}

/// Parsed `PREFIX=(modes)prefixes` token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixSpec<'a> {
    pub modes: &'a str,
    pub prefixes: &'a str,
}

impl<'a> PrefixSpec<'a> {
    pub fn parse(s: &'a str) -> Option<Self> {
        if let Some(open) = s.find('(') {
            if let Some(close) = s[open + 1..].find(')') {
                let close = open + 1 + close;
                let modes = &s[open + 1..close];
                let prefixes = &s[close + 1..];
                if !modes.is_empty() && !prefixes.is_empty() {
                    return Some(PrefixSpec { modes, prefixes });
                }
            }
        } else if !s.is_empty() {
            return Some(PrefixSpec { modes: "", prefixes: s });
        }
        None
    }

    /// Mode letter for a prefix character.
    pub fn mode_for(&self, prefix: char) -> Option<char> {
        let index = self.prefixes.chars().position(|c| c == prefix)?;
        self.modes.chars().nth(index)
    }
}
