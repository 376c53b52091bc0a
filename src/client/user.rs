//! Users seen in shared channels.

/// What we know about another user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub nick: String,
    pub username: String,
    pub hostname: String,
    pub realname: String,
    /// Services account, from extended-join, account-notify or account-tag.
    pub account: Option<String>,
    pub away: bool,
    pub away_message: Option<String>,
}

impl User {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            ..Self::default()
        }
    }

    /// `nick!user@host`, leaving out the parts we have not seen.
    pub fn prefix(&self) -> String {
        let mut out = self.nick.clone();
        if !self.username.is_empty() {
            out.push('!');
            out.push_str(&self.username);
        }
        if !self.hostname.is_empty() {
            out.push('@');
            out.push_str(&self.hostname);
        }
        out
    }
}
