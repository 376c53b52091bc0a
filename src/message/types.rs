use std::borrow::Cow;
use std::convert::Infallible;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::nom_parser::ParsedLine;
use super::tags::{parse_tags, TagValue};
use crate::ctcp::Ctcp;
use crate::ircv3::parse_server_time;

/// An owned IRC message.
///
/// Produced from one wire line by [`Message::parse`] and turned back into
/// wire form by its `Display` impl.
///
/// # Example
///
/// ```
/// use slirc_client::Message;
///
/// let msg = Message::parse(":nick!user@host PRIVMSG #channel :Hello!");
/// assert_eq!(msg.nick(), Some("nick"));
/// assert_eq!(msg.params, vec!["#channel", "Hello!"]);
///
/// let reply = Message::privmsg("#channel", "Hi back");
/// assert_eq!(reply.to_string(), "PRIVMSG #channel :Hi back");
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// IRCv3 message tags, already unescaped.
    pub tags: Option<Vec<Tag>>,
    /// Source of the message (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    /// Command name or three-digit numeric. Empty for malformed input.
    pub command: String,
    /// Parameters, trailing last.
    pub params: Vec<String>,
}

impl Message {
    /// Parse one wire line.
    ///
    /// Never fails: malformed input (for example tags or a prefix with no
    /// following space) yields a message with an empty command, which
    /// callers treat as a no-op.
    pub fn parse(line: &str) -> Message {
        let line = line.trim_end_matches(['\r', '\n']);
        match ParsedLine::parse(line) {
            Ok(parsed) => Message {
                tags: parsed.tags.map(parse_tags),
                prefix: parsed.prefix.map(str::to_owned),
                command: parsed.command.to_owned(),
                params: parsed.params.into_iter().map(str::to_owned).collect(),
            },
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed line");
                Message::default()
            }
        }
    }

    /// Create a message from a command and parameters.
    #[must_use]
    pub fn new<C, I, P>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Message {
            tags: None,
            prefix: None,
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// `PRIVMSG target :text`
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new("PRIVMSG", [target.into(), text.into()])
    }

    /// `NOTICE target :text`
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new("NOTICE", [target.into(), text.into()])
    }

    /// `TAGMSG target`, usually combined with [`with_tag`](Self::with_tag).
    #[must_use]
    pub fn tagmsg(target: impl Into<String>) -> Self {
        Self::new("TAGMSG", [target.into()])
    }

    /// Append a tag.
    #[must_use]
    pub fn with_tag<K, V>(mut self, key: K, value: Option<V>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let tag = Tag::new(key, value.map(Into::into));
        self.tags.get_or_insert_with(Vec::new).push(tag);
        self
    }

    /// Set the source prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// True if the command is exactly three ASCII digits.
    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }

    /// The numeric code, if this is a numeric reply.
    pub fn numeric(&self) -> Option<u16> {
        if self.is_numeric() {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, usually the human-readable text.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Nickname part of the prefix (the whole prefix for server sources).
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let end = prefix.find(['!', '@']).unwrap_or(prefix.len());
        Some(&prefix[..end])
    }

    /// Username part of the prefix, between `!` and `@`.
    pub fn user(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let start = prefix.find('!')? + 1;
        let end = prefix[start..].find('@').map_or(prefix.len(), |i| start + i);
        Some(&prefix[start..end])
    }

    /// Hostname part of the prefix, after `@`.
    pub fn host(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        prefix.find('@').map(|i| &prefix[i + 1..])
    }

    /// Raw value of a tag. Boolean tags yield `Some("")`.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|Tag(k, _)| k.as_ref() == key)
            .map(|Tag(_, v)| v.as_deref().unwrap_or(""))
    }

    /// True if the tag is present, with or without a value.
    pub fn has_tag(&self, key: &str) -> bool {
        self.tag(key).is_some()
    }

    /// Decoded value of a tag.
    ///
    /// Decoding happens here, on lookup, never while parsing.
    pub fn tag_value(&self, key: &str) -> Option<TagValue> {
        let Tag(_, value) = self
            .tags
            .as_ref()?
            .iter()
            .find(|Tag(k, _)| k.as_ref() == key)?;
        Some(TagValue::process(value.as_deref()))
    }

    /// Tags as key/value pairs.
    pub fn tag_pairs(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.tags
            .iter()
            .flatten()
            .map(|Tag(k, v)| (k.as_ref(), v.as_deref()))
    }

    /// The `time` tag, parsed. `None` when absent or malformed.
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        self.tag("time").and_then(parse_server_time)
    }

    /// True for a PRIVMSG or NOTICE whose text is wrapped in `\x01`.
    pub fn is_ctcp(&self) -> bool {
        self.ctcp().is_some()
    }

    /// The CTCP payload of a PRIVMSG or NOTICE.
    pub fn ctcp(&self) -> Option<Ctcp<'_>> {
        if self.command != "PRIVMSG" && self.command != "NOTICE" {
            return None;
        }
        if self.params.len() < 2 {
            return None;
        }
        Ctcp::parse(self.trailing()?)
    }

    /// Upper-cased CTCP command, or an empty string.
    pub fn ctcp_command(&self) -> String {
        self.ctcp().map(|c| c.command.to_ascii_uppercase()).unwrap_or_default()
    }

    /// CTCP parameters, or an empty string.
    pub fn ctcp_params(&self) -> &str {
        self.ctcp().map(|c| c.params).unwrap_or("")
    }
}

impl FromStr for Message {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Message::parse(s))
    }
}

/// An IRCv3 message tag: key and optional value.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag(pub Cow<'static, str>, pub Option<String>);

impl Tag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Tag(Cow::Owned(key.into()), value)
    }

    /// The tag key.
    pub fn key(&self) -> &str {
        &self.0
    }

    /// The tag value, if it has one.
    pub fn value(&self) -> Option<&str> {
        self.1.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_accessors() {
        let msg = Message::parse(":nick!user@host.example PRIVMSG #c :hi");
        assert_eq!(msg.nick(), Some("nick"));
        assert_eq!(msg.user(), Some("user"));
        assert_eq!(msg.host(), Some("host.example"));

        let msg = Message::parse(":irc.example.net NOTICE * :hello");
        assert_eq!(msg.nick(), Some("irc.example.net"));
        assert_eq!(msg.user(), None);
        assert_eq!(msg.host(), None);

        let msg = Message::parse(":nick@host JOIN #c");
        assert_eq!(msg.nick(), Some("nick"));
        assert_eq!(msg.host(), Some("host"));
    }

    #[test]
    fn test_numeric_detection() {
        assert!(Message::parse(":s 001 me :Welcome").is_numeric());
        assert_eq!(Message::parse(":s 433 * me :in use").numeric(), Some(433));
        assert!(!Message::parse("PING :x").is_numeric());
        assert!(!Message::parse(":s 0001 me :x").is_numeric());
    }

    #[test]
    fn test_server_time_tag() {
        let msg = Message::parse("@time=2023-01-01T12:00:00.000Z :n!u@h PRIVMSG #c :hi");
        assert_eq!(msg.server_time().map(|t| t.timestamp()), Some(1_672_574_400));
        assert_eq!(Message::parse("@time=soon PING :x").server_time(), None);
    }

    #[test]
    fn test_malformed_is_empty() {
        let msg = Message::parse("@tags-without-anything-else");
        assert!(msg.command.is_empty());
        assert_eq!(msg, Message::default());

        assert!(Message::parse(":prefix-only").command.is_empty());
        assert!(Message::parse("").command.is_empty());
    }

    #[test]
    fn test_tag_lookup() {
        let msg = Message::parse("@msgid=abc;+draft/bot;note=a\\sb :n!u@h PRIVMSG #c :x");
        assert_eq!(msg.tag("msgid"), Some("abc"));
        assert_eq!(msg.tag("+draft/bot"), Some(""));
        assert_eq!(msg.tag("note"), Some("a b"));
        assert!(msg.has_tag("+draft/bot"));
        assert_eq!(msg.tag("missing"), None);
        assert_eq!(msg.tag_value("+draft/bot"), Some(TagValue::Flag));
    }

    #[test]
    fn test_ctcp_accessors() {
        let msg = Message::parse(":a!b@c PRIVMSG me :\x01ACTION waves hello\x01");
        assert!(msg.is_ctcp());
        assert_eq!(msg.ctcp_command(), "ACTION");
        assert_eq!(msg.ctcp_params(), "waves hello");

        let plain = Message::parse(":a!b@c PRIVMSG me :hello");
        assert!(!plain.is_ctcp());
        assert_eq!(plain.ctcp_command(), "");

        let topic = Message::parse(":a!b@c TOPIC #c :\x01odd\x01");
        assert!(!topic.is_ctcp());
    }

    #[test]
    fn test_builder() {
        let msg = Message::tagmsg("#chan").with_tag("+typing", Some("active"));
        assert_eq!(msg.tag("+typing"), Some("active"));
        assert_eq!(msg.params, vec!["#chan"]);
    }
}
