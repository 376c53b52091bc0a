//! Read-only views of the session and client-side conveniences.

use std::collections::VecDeque;

use super::{Channel, Client, ConnectionStats, User};
use crate::event::ChatMessage;
use crate::message::Message;
use crate::util::wildcard_match;

impl Client {
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// Names of joined channels, sorted.
    pub fn joined_channels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn user(&self, nick: &str) -> Option<&User> {
        self.users.get(nick)
    }

    /// Channels we share with `nick`, sorted.
    pub fn common_channels(&self, nick: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .channels
            .values()
            .filter(|c| c.has_member(nick))
            .map(|c| c.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Capabilities offered by the server in `CAP LS`/`CAP NEW`.
    pub fn available_caps(&self) -> Vec<&str> {
        self.caps.available().keys().map(String::as_str).collect()
    }

    pub fn enabled_caps(&self) -> Vec<&str> {
        self.caps.enabled().iter().map(String::as_str).collect()
    }

    /// An ISUPPORT token: `None` if absent, `Some(None)` for a bare flag.
    pub fn isupport(&self, key: &str) -> Option<Option<&str>> {
        self.isupport.get(key)
    }

    pub fn monitored_nicks(&self) -> Vec<&str> {
        self.monitored.iter().map(String::as_str).collect()
    }

    /// Messages kept while history is enabled, oldest first.
    pub fn message_history(&self) -> &VecDeque<ChatMessage> {
        &self.history
    }

    pub fn clear_message_history(&mut self) {
        self.history.clear();
    }

    /// Text of a recent message by its `msgid` tag.
    pub fn message_text_by_id(&self, msgid: &str) -> Option<&str> {
        self.tracked.get(msgid).map(String::as_str)
    }

    /// The `msgid` that `msg` replies to, from `+draft/reply` or
    /// `draft/reply`.
    pub fn reply_to_msgid<'a>(&self, msg: &'a Message) -> Option<&'a str> {
        msg.tag("+draft/reply").or_else(|| msg.tag("draft/reply"))
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.counters.snapshot(self.clock.now_ms())
    }

    pub fn reset_connection_stats(&mut self) {
        self.counters.reset();
    }

    /// Mean PING round trip in milliseconds.
    pub fn average_latency(&self) -> Option<u64> {
        self.counters.average_latency()
    }

    pub fn is_away(&self) -> bool {
        self.away_message.is_some()
    }

    pub fn away_message(&self) -> Option<&str> {
        self.away_message.as_deref()
    }

    pub fn has_sts_policy(&self, host: &str) -> bool {
        self.sts.contains(host, self.clock.unix_time())
    }

    pub fn clear_sts_policy(&mut self, host: &str) {
        self.sts.remove(host);
    }

    pub fn clear_all_sts_policies(&mut self) {
        self.sts.clear();
    }

    /// Members of `channel` whose nick starts with `prefix`, ignoring case,
    /// sorted the same way.
    pub fn matching_nicks(&self, channel: &str, prefix: &str) -> Vec<String> {
        let Some(chan) = self.channels.get(channel) else {
            return Vec::new();
        };
        let prefix = prefix.to_lowercase();
        let mut nicks: Vec<String> = chan
            .members()
            .map(|(nick, _)| nick)
            .filter(|nick| nick.to_lowercase().starts_with(&prefix))
            .map(str::to_owned)
            .collect();
        nicks.sort_by_key(|n| n.to_lowercase());
        nicks
    }

    /// Tab completion: the `cycle`-th match for `partial`, wrapping.
    pub fn complete_nick(&self, channel: &str, partial: &str, cycle: usize) -> Option<String> {
        let mut matches = self.matching_nicks(channel, partial);
        if matches.is_empty() {
            return None;
        }
        let index = cycle % matches.len();
        Some(matches.swap_remove(index))
    }

    pub fn add_highlight_pattern(&mut self, pattern: &str) {
        if !pattern.is_empty() && !self.config.highlight_patterns.iter().any(|p| p == pattern) {
            self.config.highlight_patterns.push(pattern.to_owned());
        }
    }

    pub fn remove_highlight_pattern(&mut self, pattern: &str) {
        self.config.highlight_patterns.retain(|p| p != pattern);
    }

    pub fn clear_highlight_patterns(&mut self) {
        self.config.highlight_patterns.clear();
    }

    /// True if `text` mentions our nick or a highlight pattern, ignoring
    /// case.
    pub fn is_highlighted(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        std::iter::once(self.current_nick.as_str())
            .chain(self.config.highlight_patterns.iter().map(String::as_str))
            .filter(|p| !p.is_empty())
            .any(|p| text.contains(&p.to_lowercase()))
    }

    /// Drop PRIVMSG and NOTICE from senders matching `mask`.
    pub fn ignore(&mut self, mask: &str) {
        if !self.config.ignore_masks.iter().any(|m| m == mask) {
            self.config.ignore_masks.push(mask.to_owned());
        }
    }

    /// Returns whether the mask was present.
    pub fn unignore(&mut self, mask: &str) -> bool {
        let before = self.config.ignore_masks.len();
        self.config.ignore_masks.retain(|m| m != mask);
        self.config.ignore_masks.len() != before
    }

    pub fn clear_ignores(&mut self) {
        self.config.ignore_masks.clear();
    }

    /// True if a nick or `nick!user@host` matches an ignore mask.
    pub fn is_ignored(&self, source: &str) -> bool {
        self.config
            .ignore_masks
            .iter()
            .any(|mask| wildcard_match(mask, source))
    }

    pub(super) fn is_ignored_message(&self, msg: &Message) -> bool {
        if self.config.ignore_masks.is_empty() {
            return false;
        }
        msg.nick().is_some_and(|nick| self.is_ignored(nick))
            || msg.prefix.as_deref().is_some_and(|prefix| self.is_ignored(prefix))
    }

    pub(super) fn remember(&mut self, chat: &ChatMessage) {
        if !self.config.history_enabled {
            return;
        }
        self.history.push_back(chat.clone());
        while self.history.len() > self.config.max_history {
            self.history.pop_front();
        }
    }

    pub(super) fn track_message(&mut self, msgid: &str, text: &str) {
        if self.config.max_tracked_messages == 0 {
            return;
        }
        if self.tracked.insert(msgid.to_owned(), text.to_owned()).is_none() {
            self.tracked_order.push_back(msgid.to_owned());
        }
        while self.tracked_order.len() > self.config.max_tracked_messages {
            if let Some(oldest) = self.tracked_order.pop_front() {
                self.tracked.remove(&oldest);
            }
        }
    }
}
