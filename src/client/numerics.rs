//! Numeric replies.

use tracing::{debug, warn};

use super::{split_member_prefix, Client, User};
use crate::encoding::TextEncoding;
use crate::event::{ConnectionStatus, Event};
use crate::message::Message;

const RPL_WELCOME: u16 = 1;
const RPL_ISUPPORT: u16 = 5;
const RPL_AWAY: u16 = 301;
const RPL_UNAWAY: u16 = 305;
const RPL_TOPIC: u16 = 332;
const RPL_TOPICWHOTIME: u16 = 333;
const RPL_NAMREPLY: u16 = 353;
const RPL_ENDOFNAMES: u16 = 366;
const RPL_MOTD: u16 = 372;
const RPL_MOTDSTART: u16 = 375;
const RPL_ENDOFMOTD: u16 = 376;
const ERR_UNKNOWNCOMMAND: u16 = 421;
const ERR_NOMOTD: u16 = 422;
const ERR_NICKNAMEINUSE: u16 = 433;
const RPL_MONONLINE: u16 = 730;
const RPL_MONOFFLINE: u16 = 731;
const RPL_LOGGEDIN: u16 = 900;
const RPL_SASLSUCCESS: u16 = 903;
const ERR_SASLFAIL: u16 = 904;
const ERR_SASLTOOLONG: u16 = 905;
const ERR_SASLABORTED: u16 = 906;

impl Client {
    pub(super) fn handle_numeric(&mut self, code: u16, msg: &Message) {
        match code {
            RPL_WELCOME => self.on_welcome(msg),
            RPL_ISUPPORT => {
                self.isupport.apply(msg);
                if self.isupport.utf8_only() {
                    debug!("server is UTF8ONLY, forcing utf-8");
                    self.decoder.set_encoding(TextEncoding::Utf8);
                    self.decoder.set_auto_detect(false);
                }
            }
            RPL_AWAY => {
                if let (Some(nick), Some(message)) = (msg.param(1), msg.param(2)) {
                    if let Some(user) = self.users.get_mut(nick) {
                        user.away = true;
                        user.away_message = Some(message.to_owned());
                    }
                }
            }
            RPL_UNAWAY => self.away_message = None,
            RPL_TOPIC => {
                if let (Some(channel), Some(topic)) = (msg.param(1), msg.param(2)) {
                    if let Some(chan) = self.channels.get_mut(channel) {
                        chan.topic = topic.to_owned();
                    }
                }
            }
            RPL_TOPICWHOTIME => {
                if let (Some(channel), Some(setter)) = (msg.param(1), msg.param(2)) {
                    let time = msg.param(3).and_then(|t| t.parse().ok()).unwrap_or(0);
                    if let Some(chan) = self.channels.get_mut(channel) {
                        chan.topic_setter = setter.to_owned();
                        chan.topic_time = time;
                    }
                }
            }
            RPL_NAMREPLY => self.on_names(msg),
            RPL_ENDOFNAMES => {
                if let Some(channel) = msg.param(1) {
                    self.emit(Event::NamesEnd {
                        channel: channel.to_owned(),
                    });
                }
            }
            RPL_MOTDSTART | RPL_MOTD => {
                let line = msg.trailing().unwrap_or("").to_owned();
                self.emit(Event::Motd(line));
            }
            RPL_ENDOFMOTD | ERR_NOMOTD => self.emit(Event::MotdEnd),
            ERR_UNKNOWNCOMMAND => {
                // A server without CAP support still needs NICK/USER.
                if msg.param(1).is_some_and(|c| c.eq_ignore_ascii_case("CAP")) {
                    debug!("server does not support CAP");
                    let actions = self.caps.end();
                    self.apply_cap_actions(actions);
                }
            }
            ERR_NICKNAMEINUSE => self.on_nick_in_use(msg),
            RPL_MONONLINE | RPL_MONOFFLINE => {
                let nicks: Vec<String> = msg
                    .trailing()
                    .unwrap_or("")
                    .split(',')
                    .filter(|t| !t.is_empty())
                    .map(|t| t.split('!').next().unwrap_or(t).to_owned())
                    .collect();
                self.emit(if code == RPL_MONONLINE {
                    Event::MonitorOnline(nicks)
                } else {
                    Event::MonitorOffline(nicks)
                });
            }
            RPL_LOGGEDIN | RPL_SASLSUCCESS | ERR_SASLFAIL | ERR_SASLTOOLONG | ERR_SASLABORTED => {
                let actions = self.caps.handle_sasl_numeric(code, msg);
                self.apply_cap_actions(actions);
            }
            _ => {}
        }

        self.emit(Event::NumericReceived {
            code,
            params: msg.params.clone(),
        });
    }

    fn on_welcome(&mut self, msg: &Message) {
        if let Some(nick) = msg.param(0) {
            self.current_nick = nick.to_owned();
        }
        self.reconnect.on_connected();
        self.counters.connected_at_ms = Some(self.clock.now_ms());
        self.alt_nick_index = 0;
        self.set_status(ConnectionStatus::Connected);
        self.emit(Event::Connected);

        if self.config.bot_mode {
            let line = format!("MODE {} +B", self.current_nick);
            self.send_line(line);
        }
        if self.config.autojoin_enabled {
            let joins: Vec<String> = self
                .config
                .autojoin
                .iter()
                .map(|entry| {
                    let key = entry
                        .key
                        .clone()
                        .or_else(|| self.channel_keys.get(&entry.channel).cloned());
                    join_line(&entry.channel, key.as_deref())
                })
                .collect();
            debug!(count = joins.len(), "autojoin");
            for line in joins {
                self.send_line(line);
            }
        }
    }

    /// `353 me = #chan :@op +voice plain`
    fn on_names(&mut self, msg: &Message) {
        let (Some(channel), Some(names)) = (msg.param(2), msg.param(3)) else {
            return;
        };
        let Some(chan) = self.channels.get_mut(channel) else {
            debug!(%channel, "names for a channel we are not in");
            return;
        };
        let mut seen = Vec::new();
        for entry in names.split_whitespace() {
            let (prefix, nick) = split_member_prefix(entry);
            if nick.is_empty() {
                continue;
            }
            chan.add_member(nick, prefix);
            seen.push(nick.to_owned());
        }
        for nick in seen {
            if !self.is_self(&nick) {
                self.users
                    .entry(nick.clone())
                    .or_insert_with(|| User::new(nick));
            }
        }
    }

    /// Pick the next nickname after a 433 during registration.
    fn on_nick_in_use(&mut self, msg: &Message) {
        let taken = msg.param(1).unwrap_or(self.current_nick.as_str()).to_owned();
        self.emit(Event::NickInUse(taken));

        if self.status != ConnectionStatus::Registering {
            return;
        }

        let alts = &self.config.alt_nicks;
        let next = if let Some(alt) = alts.get(self.alt_nick_index) {
            self.alt_nick_index += 1;
            alt.clone()
        } else if let Some(base) = alts.first() {
            format!("{base}{}", self.random_suffix())
        } else {
            format!("{}_", self.current_nick)
        };

        debug!(nick = %next, "trying alternate nick");
        self.current_nick = next.clone();
        self.write_line(&format!("NICK {next}"));
    }

    /// A number below 10000 for suffixed nicks.
    fn random_suffix(&self) -> u32 {
        let mut buf = [0u8; 4];
        match getrandom::getrandom(&mut buf) {
            Ok(()) => u32::from_le_bytes(buf) % 10_000,
            Err(e) => {
                warn!(error = %e, "no os randomness, using clock for nick suffix");
                (self.clock.now_ms() % 10_000) as u32
            }
        }
    }
}

pub(super) fn join_line(channel: &str, key: Option<&str>) -> String {
    match key.filter(|k| !k.is_empty()) {
        Some(key) => format!("JOIN {channel} {key}"),
        None => format!("JOIN {channel}"),
    }
}
