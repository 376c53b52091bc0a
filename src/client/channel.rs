//! Joined channels.

use std::collections::BTreeMap;

/// Membership prefixes, highest first.
pub const MEMBER_PREFIXES: &str = "~&@%+";

/// A channel we are in.
///
/// Names are kept exactly as the server sent them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    pub name: String,
    pub topic: String,
    pub topic_setter: String,
    /// Unix seconds, from 333 or the local clock on `TOPIC`.
    pub topic_time: u64,
    pub modes: String,
    /// Nick -> prefix characters, e.g. `"@+"`.
    members: BTreeMap<String, String>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().map(|(n, p)| (n.as_str(), p.as_str()))
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_member(&self, nick: &str) -> bool {
        self.members.contains_key(nick)
    }

    /// Prefix string of `nick`, if present.
    pub fn member_prefix(&self, nick: &str) -> Option<&str> {
        self.members.get(nick).map(String::as_str)
    }

    pub fn is_operator(&self, nick: &str) -> bool {
        self.member_prefix(nick)
            .is_some_and(|p| p.contains(['~', '&', '@']))
    }

    pub fn is_voiced(&self, nick: &str) -> bool {
        self.member_prefix(nick).is_some_and(|p| p.contains('+'))
    }

    /// Add or update a member.
    pub(crate) fn add_member(&mut self, nick: impl Into<String>, prefix: impl Into<String>) {
        self.members.insert(nick.into(), prefix.into());
    }

    pub(crate) fn remove_member(&mut self, nick: &str) -> bool {
        self.members.remove(nick).is_some()
    }

    /// Move `old` to `new`, keeping its prefixes.
    pub(crate) fn rename_member(&mut self, old: &str, new: &str) -> bool {
        match self.members.remove(old) {
            Some(prefix) => {
                self.members.insert(new.to_owned(), prefix);
                true
            }
            None => false,
        }
    }
}

/// Split a 353 entry into its prefixes and the nick.
///
/// With `userhost-in-names` the `!user@host` part is dropped.
pub fn split_member_prefix(entry: &str) -> (&str, &str) {
    let nick_start = entry
        .find(|c: char| !MEMBER_PREFIXES.contains(c))
        .unwrap_or(entry.len());
    let (prefix, rest) = entry.split_at(nick_start);
    let nick = rest.split('!').next().unwrap_or(rest);
    (prefix, nick)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_member_prefix() {
        assert_eq!(split_member_prefix("@+alice"), ("@+", "alice"));
        assert_eq!(split_member_prefix("bob"), ("", "bob"));
        assert_eq!(split_member_prefix("~carol!c@host"), ("~", "carol"));
        assert_eq!(split_member_prefix("@"), ("@", ""));
    }

    #[test]
    fn test_rename_keeps_prefix() {
        let mut chan = Channel::new("#rust");
        chan.add_member("alice", "@");
        assert!(chan.rename_member("alice", "alicia"));
        assert!(!chan.has_member("alice"));
        assert!(chan.is_operator("alicia"));
        assert!(!chan.is_voiced("alicia"));
        assert!(!chan.rename_member("nobody", "x"));
        assert_eq!(chan.member_count(), 1);
    }
}
