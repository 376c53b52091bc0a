//! Commands issued by the host.
//!
//! Everything here goes through the outbound scheduler at normal
//! priority; nothing is written to the transport directly.

use tracing::warn;

use super::numerics::join_line;
use super::Client;
use crate::ctcp::encode_ctcp;
use crate::event::ConnectionStatus;
use crate::message::Message;
use crate::util::{split_message_text, wire_len, MAX_LINE_LEN};

/// Which end of a CHATHISTORY window to anchor on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryAnchor<'a> {
    MsgId(&'a str),
    Timestamp(&'a str),
}

impl std::fmt::Display for HistoryAnchor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MsgId(id) => write!(f, "msgid={id}"),
            Self::Timestamp(ts) => write!(f, "timestamp={ts}"),
        }
    }
}

impl Client {
    /// Queue a raw line. Lines over 512 bytes (with CRLF) are dropped with
    /// a warning.
    pub fn send_raw(&mut self, line: &str) {
        if wire_len(line) > MAX_LINE_LEN {
            warn!(len = wire_len(line), "outbound line exceeds 512 bytes, dropped");
            return;
        }
        self.send_line(line.to_owned());
    }

    /// `PRIVMSG`, split into as many lines as the 512-byte limit needs.
    pub fn send_privmsg(&mut self, target: &str, text: &str) {
        self.send_split("PRIVMSG", target, text);
    }

    /// `NOTICE`, split like [`send_privmsg`](Self::send_privmsg).
    pub fn send_notice(&mut self, target: &str, text: &str) {
        self.send_split("NOTICE", target, text);
    }

    /// CTCP ACTION (`/me`).
    pub fn send_action(&mut self, target: &str, text: &str) {
        let payload = encode_ctcp("ACTION", text);
        self.send_raw(&format!("PRIVMSG {target} :{payload}"));
    }

    /// Send a CTCP request.
    pub fn send_ctcp(&mut self, target: &str, command: &str, params: &str) {
        let payload = encode_ctcp(command, params);
        self.send_raw(&format!("PRIVMSG {target} :{payload}"));
    }

    /// One PRIVMSG per line of `lines`.
    pub fn send_multiline_privmsg<S: AsRef<str>>(&mut self, target: &str, lines: &[S]) {
        for line in lines {
            self.send_privmsg(target, line.as_ref());
        }
    }

    pub fn send_multiline_notice<S: AsRef<str>>(&mut self, target: &str, lines: &[S]) {
        for line in lines {
            self.send_notice(target, line.as_ref());
        }
    }

    /// PRIVMSG tagged `+draft/reply=<msgid>`.
    pub fn send_reply(&mut self, target: &str, text: &str, reply_to: &str) {
        let msg = Message::privmsg(target, text).with_tag("+draft/reply", Some(reply_to));
        self.send_raw(&msg.to_string());
    }

    pub fn send_reply_notice(&mut self, target: &str, text: &str, reply_to: &str) {
        let msg = Message::notice(target, text).with_tag("+draft/reply", Some(reply_to));
        self.send_raw(&msg.to_string());
    }

    fn send_split(&mut self, command: &str, target: &str, text: &str) {
        let overhead = wire_len(&format!("{command} {target} :"));
        if overhead >= MAX_LINE_LEN {
            warn!(command, len = overhead, "target leaves no room for text, dropped");
            return;
        }
        let max = MAX_LINE_LEN - overhead;
        if text.len() <= max {
            self.send_line(format!("{command} {target} :{text}"));
            return;
        }
        for chunk in split_message_text(text, max) {
            self.send_raw(&format!("{command} {target} :{chunk}"));
        }
    }

    /// `JOIN`, using a stored channel key when none is given.
    pub fn join(&mut self, channel: &str, key: Option<&str>) {
        let stored = self.channel_keys.get(channel).cloned();
        let line = join_line(channel, key.or(stored.as_deref()));
        self.send_line(line);
    }

    pub fn part(&mut self, channel: &str, message: Option<&str>) {
        let line = match message.filter(|m| !m.is_empty()) {
            Some(message) => format!("PART {channel} :{message}"),
            None => format!("PART {channel}"),
        };
        self.send_line(line);
    }

    pub fn set_topic(&mut self, channel: &str, topic: &str) {
        self.send_line(format!("TOPIC {channel} :{topic}"));
    }

    /// Change nick. Before registration completes the new nick is adopted
    /// at once; afterwards it is adopted when the server confirms it.
    pub fn set_nick(&mut self, nick: &str) {
        if self.status != ConnectionStatus::Connected {
            self.current_nick = nick.to_owned();
        }
        self.send_line(format!("NICK {nick}"));
    }

    pub fn set_mode(&mut self, target: &str, modes: &str, params: &[&str]) {
        let mut line = format!("MODE {target} {modes}");
        for param in params {
            line.push(' ');
            line.push_str(param);
        }
        self.send_line(line);
    }

    pub fn whois(&mut self, nick: &str) {
        self.send_line(format!("WHOIS {nick}"));
    }

    /// Change our realname (`SETNAME`).
    pub fn set_realname(&mut self, realname: &str) {
        self.send_line(format!("SETNAME :{realname}"));
    }

    pub fn set_away(&mut self, message: &str) {
        self.away_message = Some(message.to_owned());
        self.send_line(format!("AWAY :{message}"));
    }

    pub fn set_back(&mut self) {
        self.away_message = None;
        self.send_line("AWAY".to_owned());
    }

    /// Send `PING :<token>`; the matching PONG yields
    /// [`Event::LatencyMeasured`](crate::Event::LatencyMeasured).
    pub fn ping(&mut self, token: &str) {
        self.send_line(format!("PING :{token}"));
    }

    pub fn op(&mut self, channel: &str, nick: &str) {
        self.set_mode(channel, "+o", &[nick]);
    }

    pub fn deop(&mut self, channel: &str, nick: &str) {
        self.set_mode(channel, "-o", &[nick]);
    }

    pub fn voice(&mut self, channel: &str, nick: &str) {
        self.set_mode(channel, "+v", &[nick]);
    }

    pub fn devoice(&mut self, channel: &str, nick: &str) {
        self.set_mode(channel, "-v", &[nick]);
    }

    pub fn kick(&mut self, channel: &str, nick: &str, reason: Option<&str>) {
        let line = match reason.filter(|r| !r.is_empty()) {
            Some(reason) => format!("KICK {channel} {nick} :{reason}"),
            None => format!("KICK {channel} {nick}"),
        };
        self.send_line(line);
    }

    pub fn ban(&mut self, channel: &str, mask: &str) {
        self.set_mode(channel, "+b", &[mask]);
    }

    pub fn unban(&mut self, channel: &str, mask: &str) {
        self.set_mode(channel, "-b", &[mask]);
    }

    /// Ban `nick!*@*`, then kick.
    pub fn kickban(&mut self, channel: &str, nick: &str, reason: Option<&str>) {
        self.ban(channel, &format!("{nick}!*@*"));
        self.kick(channel, nick, reason);
    }

    pub fn request_ban_list(&mut self, channel: &str) {
        self.send_line(format!("MODE {channel} +b"));
    }

    pub fn request_exception_list(&mut self, channel: &str) {
        self.send_line(format!("MODE {channel} +e"));
    }

    /// Add (`+e`) or remove (`-e`) a ban exception.
    pub fn set_exception(&mut self, channel: &str, mask: &str, add: bool) {
        self.set_mode(channel, if add { "+e" } else { "-e" }, &[mask]);
    }

    pub fn request_invite_list(&mut self, channel: &str) {
        self.send_line(format!("MODE {channel} +I"));
    }

    /// Add (`+I`) or remove (`-I`) an invite exception.
    pub fn set_invite_exception(&mut self, channel: &str, mask: &str, add: bool) {
        self.set_mode(channel, if add { "+I" } else { "-I" }, &[mask]);
    }

    pub fn quiet(&mut self, channel: &str, mask: &str) {
        self.set_mode(channel, "+q", &[mask]);
    }

    pub fn unquiet(&mut self, channel: &str, mask: &str) {
        self.set_mode(channel, "-q", &[mask]);
    }

    pub fn request_quiet_list(&mut self, channel: &str) {
        self.send_line(format!("MODE {channel} +q"));
    }

    /// Remember a key for `channel`; used by [`join`](Self::join) and
    /// autojoin when no key is given.
    pub fn set_channel_key(&mut self, channel: &str, key: &str) {
        self.channel_keys.insert(channel.to_owned(), key.to_owned());
    }

    pub fn channel_key(&self, channel: &str) -> Option<&str> {
        self.channel_keys.get(channel).map(String::as_str)
    }

    pub fn clear_channel_key(&mut self, channel: &str) {
        self.channel_keys.remove(channel);
    }

    pub fn monitor_add(&mut self, nicks: &[&str]) {
        if nicks.is_empty() {
            return;
        }
        self.monitored.extend(nicks.iter().map(|&n| n.to_owned()));
        self.send_line(format!("MONITOR + {}", nicks.join(",")));
    }

    pub fn monitor_remove(&mut self, nicks: &[&str]) {
        if nicks.is_empty() {
            return;
        }
        for nick in nicks {
            self.monitored.remove(*nick);
        }
        self.send_line(format!("MONITOR - {}", nicks.join(",")));
    }

    pub fn monitor_clear(&mut self) {
        self.monitored.clear();
        self.send_line("MONITOR C".to_owned());
    }

    pub fn monitor_list(&mut self) {
        self.send_line("MONITOR L".to_owned());
    }

    pub fn monitor_status(&mut self) {
        self.send_line("MONITOR S".to_owned());
    }

    pub fn nickserv_identify(&mut self, password: &str) {
        self.send_privmsg("NickServ", &format!("IDENTIFY {password}"));
    }

    pub fn nickserv_ghost(&mut self, nick: &str, password: &str) {
        self.send_privmsg("NickServ", &format!("GHOST {nick} {password}"));
    }

    pub fn nickserv_register(&mut self, password: &str, email: &str) {
        self.send_privmsg("NickServ", &format!("REGISTER {password} {email}"));
    }

    pub fn nickserv_group(&mut self, password: &str) {
        self.send_privmsg("NickServ", &format!("GROUP {password}"));
    }

    pub fn chanserv_register(&mut self, channel: &str) {
        self.send_privmsg("ChanServ", &format!("REGISTER {channel}"));
    }

    pub fn chanserv_identify(&mut self, channel: &str, password: &str) {
        self.send_privmsg("ChanServ", &format!("IDENTIFY {channel} {password}"));
    }

    /// `LIST [pattern] [>min,<max]`. The user-count filter needs ELIST `U`.
    pub fn list_channels(&mut self, pattern: Option<&str>, min_users: Option<u32>, max_users: Option<u32>) {
        let mut line = "LIST".to_owned();
        if let Some(pattern) = pattern.filter(|p| !p.is_empty()) {
            line.push(' ');
            line.push_str(pattern);
        }
        let filters: Vec<String> = min_users
            .map(|n| format!(">{n}"))
            .into_iter()
            .chain(max_users.map(|n| format!("<{n}")))
            .collect();
        if !filters.is_empty() {
            line.push(' ');
            line.push_str(&filters.join(","));
        }
        self.send_line(line);
    }

    pub fn oper(&mut self, name: &str, password: &str) {
        self.send_line(format!("OPER {name} {password}"));
    }

    pub fn knock(&mut self, channel: &str, message: Option<&str>) {
        let line = match message.filter(|m| !m.is_empty()) {
            Some(message) => format!("KNOCK {channel} :{message}"),
            None => format!("KNOCK {channel}"),
        };
        self.send_line(line);
    }

    pub fn silence(&mut self, mask: &str) {
        self.send_line(format!("SILENCE +{mask}"));
    }

    pub fn unsilence(&mut self, mask: &str) {
        self.send_line(format!("SILENCE -{mask}"));
    }

    pub fn list_silence(&mut self) {
        self.send_line("SILENCE".to_owned());
    }

    pub fn who(&mut self, mask: &str) {
        self.send_line(format!("WHO {mask}"));
    }

    /// WHOX: `WHO <mask> %<fields>[,<querytype>]`.
    pub fn whox(&mut self, mask: &str, fields: &str, query_type: Option<u32>) {
        let mut line = format!("WHO {mask}");
        if !fields.is_empty() {
            line.push_str(" %");
            line.push_str(fields);
            if let Some(query_type) = query_type {
                line.push_str(&format!(",{query_type}"));
            }
        }
        self.send_line(line);
    }

    pub fn whowas(&mut self, nick: &str, count: u32) {
        self.send_line(format!("WHOWAS {nick} {count}"));
    }

    pub fn invite(&mut self, nick: &str, channel: &str) {
        self.send_line(format!("INVITE {nick} {channel}"));
    }

    pub fn userhost(&mut self, nick: &str) {
        self.send_line(format!("USERHOST {nick}"));
    }

    /// IRCv3 account registration: `REGISTER <account> <password> [email]`.
    pub fn register_account(&mut self, account: &str, password: &str, email: Option<&str>) {
        let line = match email.filter(|e| !e.is_empty()) {
            Some(email) => format!("REGISTER {account} {password} {email}"),
            None => format!("REGISTER {account} {password}"),
        };
        self.send_line(line);
    }

    pub fn verify_account(&mut self, account: &str, code: &str) {
        self.send_line(format!("VERIFY {account} {code}"));
    }

    /// `CHATHISTORY BETWEEN <target> timestamp=<a> timestamp=<b> <limit>`
    pub fn chathistory_between(&mut self, target: &str, start: &str, end: &str, limit: u32) {
        self.send_line(format!(
            "CHATHISTORY BETWEEN {target} timestamp={start} timestamp={end} {limit}"
        ));
    }

    pub fn chathistory_before(&mut self, target: &str, anchor: HistoryAnchor<'_>, limit: u32) {
        self.send_line(format!("CHATHISTORY BEFORE {target} {anchor} {limit}"));
    }

    pub fn chathistory_after(&mut self, target: &str, anchor: HistoryAnchor<'_>, limit: u32) {
        self.send_line(format!("CHATHISTORY AFTER {target} {anchor} {limit}"));
    }

    pub fn chathistory_latest(&mut self, target: &str, limit: u32) {
        self.send_line(format!("CHATHISTORY LATEST {target} * {limit}"));
    }

    /// `MARKREAD <target> timestamp=<ts>`
    pub fn send_read_marker(&mut self, target: &str, timestamp: &str) {
        self.send_line(format!("MARKREAD {target} timestamp={timestamp}"));
    }

    /// `+typing=active` or `+typing=done`.
    pub fn send_typing(&mut self, target: &str, typing: bool) {
        let state = if typing { "active" } else { "done" };
        let msg = Message::tagmsg(target).with_tag("+typing", Some(state));
        self.send_line(msg.to_string());
    }

    /// React to `msgid` with `reaction`.
    pub fn send_reaction(&mut self, target: &str, msgid: &str, reaction: &str) {
        let msg = Message::tagmsg(target)
            .with_tag("+draft/reply", Some(msgid))
            .with_tag("+draft/react", Some(reaction));
        self.send_line(msg.to_string());
    }

    pub fn remove_reaction(&mut self, target: &str, msgid: &str, reaction: &str) {
        let msg = Message::tagmsg(target)
            .with_tag("+draft/reply", Some(msgid))
            .with_tag("+draft/unreact", Some(reaction));
        self.send_line(msg.to_string());
    }

    /// Toggle user mode `+B`. Applied at once when registered, and after
    /// every future 001.
    pub fn set_bot_mode(&mut self, enabled: bool) {
        self.config.bot_mode = enabled;
        if self.status == ConnectionStatus::Connected {
            let sign = if enabled { '+' } else { '-' };
            let line = format!("MODE {} {sign}B", self.current_nick);
            self.send_line(line);
        }
    }

    /// Ask for an extra capability: at once if negotiation is over and the
    /// server offers it, otherwise at the next negotiation.
    pub fn request_capability(&mut self, cap: &str) {
        if !self.config.request_caps.iter().any(|c| c == cap) {
            self.config.request_caps.push(cap.to_owned());
        }
        if let Some(line) = self.caps.request_capability(cap) {
            self.send_line(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_anchor_display() {
        assert_eq!(HistoryAnchor::MsgId("abc").to_string(), "msgid=abc");
        assert_eq!(
            HistoryAnchor::Timestamp("2024-01-01T00:00:00.000Z").to_string(),
            "timestamp=2024-01-01T00:00:00.000Z"
        );
    }
}
