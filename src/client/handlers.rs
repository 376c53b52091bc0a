//! Handlers for named commands from the server.

use tracing::{debug, warn};

use super::{BatchInfo, Channel, Client, User};
use crate::ctcp::encode_ctcp;
use crate::dcc::{DccOffer, DccTransfer};
use crate::event::{ChatMessage, Event, StandardReplyKind};
use crate::ircv3::local_time_rfc2822;
use crate::message::Message;
use crate::scheduler::PRIORITY_URGENT;

impl Client {
    pub(super) fn handle_command(&mut self, msg: &Message) {
        match msg.command.to_ascii_uppercase().as_str() {
            "PING" => {
                let token = msg.trailing().unwrap_or("");
                self.enqueue(format!("PONG :{token}"), PRIORITY_URGENT);
            }
            "PONG" => self.on_pong(),
            "PRIVMSG" => self.on_privmsg(msg),
            "NOTICE" => self.on_notice(msg),
            "JOIN" => self.on_join(msg),
            "PART" => self.on_part(msg),
            "KICK" => self.on_kick(msg),
            "QUIT" => self.on_quit(msg),
            "NICK" => self.on_nick(msg),
            "TOPIC" => self.on_topic(msg),
            "MODE" => {
                let Some(target) = msg.param(0) else { return };
                self.emit(Event::ModeChanged {
                    target: target.to_owned(),
                    modes: msg.param(1).unwrap_or("").to_owned(),
                    params: msg.params.iter().skip(2).cloned().collect(),
                });
            }
            "AWAY" => self.on_away(msg),
            "ACCOUNT" => self.on_account(msg),
            "CHGHOST" => self.on_chghost(msg),
            "SETNAME" => self.on_setname(msg),
            "INVITE" => {
                let (Some(channel), Some(by)) = (msg.param(1), msg.nick()) else {
                    return;
                };
                self.emit(Event::Invited {
                    channel: channel.to_owned(),
                    by: by.to_owned(),
                });
            }
            "FAIL" => self.on_standard_reply(StandardReplyKind::Fail, msg),
            "WARN" => self.on_standard_reply(StandardReplyKind::Warn, msg),
            "NOTE" => self.on_standard_reply(StandardReplyKind::Note, msg),
            "BATCH" => self.on_batch(msg),
            "CAP" => {
                let actions = self.caps.handle_cap(msg);
                self.apply_cap_actions(actions);
            }
            "AUTHENTICATE" => {
                let actions = self.caps.handle_authenticate(msg);
                self.apply_cap_actions(actions);
            }
            "ERROR" => {
                let reason = msg.trailing().unwrap_or("").to_owned();
                warn!(%reason, "server error");
                self.emit(Event::ServerError(reason));
            }
            other => debug!(command = other, "unhandled command"),
        }
    }

    fn on_pong(&mut self) {
        let Some(sent) = self.last_ping_sent_ms.take() else {
            return;
        };
        let latency = self.clock.now_ms().saturating_sub(sent);
        self.counters.record_latency(latency);
        self.emit(Event::LatencyMeasured(latency));
    }

    fn chat_message(msg: &Message, target: &str, text: &str) -> ChatMessage {
        ChatMessage {
            sender: msg.nick().unwrap_or("").to_owned(),
            target: target.to_owned(),
            text: text.to_owned(),
            tags: msg.tags.clone().unwrap_or_default(),
        }
    }

    fn on_privmsg(&mut self, msg: &Message) {
        let (Some(target), Some(text)) = (msg.param(0), msg.param(1)) else {
            return;
        };
        if self.is_ignored_message(msg) {
            debug!(prefix = ?msg.prefix, "ignored privmsg");
            return;
        }
        self.note_account_tag(msg);

        if let Some(ctcp) = msg.ctcp() {
            let sender = msg.nick().unwrap_or("").to_owned();
            let command = ctcp.command.to_ascii_uppercase();
            let params = ctcp.params.to_owned();
            self.emit(Event::CtcpReceived {
                sender: sender.clone(),
                target: target.to_owned(),
                command: command.clone(),
                params: params.clone(),
            });

            match command.as_str() {
                "ACTION" => {
                    let chat = Self::chat_message(msg, target, &params);
                    self.remember(&chat);
                    self.emit(Event::Action(chat));
                }
                "VERSION" => {
                    let reply = self.config.version_reply.clone();
                    self.ctcp_reply(&sender, "VERSION", &reply);
                }
                "PING" => self.ctcp_reply(&sender, "PING", &params),
                "TIME" => self.ctcp_reply(&sender, "TIME", &local_time_rfc2822()),
                "DCC" => self.on_dcc_offer(&sender, &params),
                _ => {}
            }
            return;
        }

        if let Some(id) = msg.tag("msgid") {
            self.track_message(id, text);
        }
        let chat = Self::chat_message(msg, target, text);
        if self.is_highlighted(text) {
            self.emit(Event::Highlighted(chat.clone()));
        }
        self.remember(&chat);
        self.emit(Event::Privmsg(chat));
    }

    fn ctcp_reply(&mut self, nick: &str, command: &str, params: &str) {
        if nick.is_empty() {
            return;
        }
        let payload = encode_ctcp(command, params);
        self.send_line(format!("NOTICE {nick} :{payload}"));
    }

    fn on_dcc_offer(&mut self, nick: &str, params: &str) {
        let offer = match DccOffer::parse(params) {
            Ok(offer) => offer,
            Err(e) => {
                warn!(%nick, error = %e, "ignoring dcc offer");
                return;
            }
        };
        let transfer = DccTransfer::incoming(nick, offer);
        let event = Event::DccRequest {
            index: self.transfers.len(),
            nick: nick.to_owned(),
            filename: transfer.filename().to_owned(),
            size: transfer.size(),
        };
        debug!(%nick, filename = transfer.filename(), "dcc offer received");
        self.transfers.push(transfer);
        self.emit(event);
    }

    fn on_notice(&mut self, msg: &Message) {
        let (Some(target), Some(text)) = (msg.param(0), msg.param(1)) else {
            return;
        };
        if self.is_ignored_message(msg) {
            return;
        }
        if let Some(ctcp) = msg.ctcp() {
            self.emit(Event::CtcpReply {
                sender: msg.nick().unwrap_or("").to_owned(),
                command: ctcp.command.to_ascii_uppercase(),
                params: ctcp.params.to_owned(),
            });
            return;
        }
        let chat = Self::chat_message(msg, target, text);
        self.emit(Event::Notice(chat));
    }

    fn on_join(&mut self, msg: &Message) {
        let (Some(channel), Some(nick)) = (msg.param(0), msg.nick()) else {
            return;
        };

        if self.is_self(nick) {
            self.channels
                .entry(channel.to_owned())
                .or_insert_with(|| Channel::new(channel));
            self.emit(Event::Joined {
                channel: channel.to_owned(),
            });
            return;
        }

        // extended-join: JOIN #chan account :realname
        let (account, realname) = if msg.params.len() >= 3 {
            (
                msg.param(1).filter(|a| *a != "*").map(str::to_owned),
                msg.param(2).map(str::to_owned),
            )
        } else {
            (None, None)
        };

        // Users are only tracked while they share a channel with us.
        if let Some(chan) = self.channels.get_mut(channel) {
            chan.add_member(nick, "");
            let user = self
                .users
                .entry(nick.to_owned())
                .or_insert_with(|| User::new(nick));
            if let Some(username) = msg.user() {
                user.username = username.to_owned();
            }
            if let Some(hostname) = msg.host() {
                user.hostname = hostname.to_owned();
            }
            if account.is_some() {
                user.account = account.clone();
            }
            if let Some(realname) = &realname {
                user.realname = realname.clone();
            }
        }

        self.emit(Event::UserJoined {
            channel: channel.to_owned(),
            nick: nick.to_owned(),
            account,
            realname,
        });
    }

    fn on_part(&mut self, msg: &Message) {
        let (Some(channel), Some(nick)) = (msg.param(0), msg.nick()) else {
            return;
        };
        let message = msg.param(1).unwrap_or("").to_owned();

        if self.is_self(nick) {
            self.channels.remove(channel);
            self.emit(Event::Parted {
                channel: channel.to_owned(),
                message,
            });
            return;
        }

        if let Some(chan) = self.channels.get_mut(channel) {
            chan.remove_member(nick);
        }
        self.forget_if_unshared(nick);
        self.emit(Event::UserParted {
            channel: channel.to_owned(),
            nick: nick.to_owned(),
            message,
        });
    }

    fn on_kick(&mut self, msg: &Message) {
        let (Some(channel), Some(victim)) = (msg.param(0), msg.param(1)) else {
            return;
        };
        let by = msg.nick().unwrap_or("").to_owned();
        let reason = msg.param(2).unwrap_or("").to_owned();

        if self.is_self(victim) {
            self.channels.remove(channel);
            self.emit(Event::Kicked {
                channel: channel.to_owned(),
                by,
                reason,
            });
            return;
        }

        if let Some(chan) = self.channels.get_mut(channel) {
            chan.remove_member(victim);
        }
        self.forget_if_unshared(victim);
        self.emit(Event::UserKicked {
            channel: channel.to_owned(),
            nick: victim.to_owned(),
            by,
            reason,
        });
    }

    fn on_quit(&mut self, msg: &Message) {
        let Some(nick) = msg.nick() else { return };
        for chan in self.channels.values_mut() {
            chan.remove_member(nick);
        }
        self.users.remove(nick);
        self.emit(Event::UserQuit {
            nick: nick.to_owned(),
            message: msg.param(0).unwrap_or("").to_owned(),
        });
    }

    fn on_nick(&mut self, msg: &Message) {
        let (Some(old), Some(new)) = (msg.nick(), msg.param(0)) else {
            return;
        };
        for chan in self.channels.values_mut() {
            chan.rename_member(old, new);
        }
        if let Some(mut user) = self.users.remove(old) {
            user.nick = new.to_owned();
            self.users.insert(new.to_owned(), user);
        }
        if self.is_self(old) {
            debug!(%old, %new, "own nick changed");
            self.current_nick = new.to_owned();
        }
        self.emit(Event::NickChanged {
            old: old.to_owned(),
            new: new.to_owned(),
        });
    }

    fn on_topic(&mut self, msg: &Message) {
        let Some(channel) = msg.param(0) else { return };
        let topic = msg.param(1).unwrap_or("").to_owned();
        let setter = msg.nick().unwrap_or("").to_owned();
        let now = self.clock.unix_time();
        if let Some(chan) = self.channels.get_mut(channel) {
            chan.topic = topic.clone();
            chan.topic_setter = setter.clone();
            chan.topic_time = now;
        }
        self.emit(Event::TopicChanged {
            channel: channel.to_owned(),
            topic,
            setter,
        });
    }

    fn on_away(&mut self, msg: &Message) {
        let Some(nick) = msg.nick() else { return };
        let message = msg.param(0).map(str::to_owned);
        if let Some(user) = self.users.get_mut(nick) {
            user.away = message.is_some();
            user.away_message = message.clone();
        }
        self.emit(Event::UserAway {
            nick: nick.to_owned(),
            message,
        });
    }

    fn on_account(&mut self, msg: &Message) {
        let (Some(nick), Some(account)) = (msg.nick(), msg.param(0)) else {
            return;
        };
        let account = (account != "*").then(|| account.to_owned());
        if let Some(user) = self.users.get_mut(nick) {
            user.account = account.clone();
        }
        self.emit(Event::AccountChanged {
            nick: nick.to_owned(),
            account,
        });
    }

    fn on_chghost(&mut self, msg: &Message) {
        let (Some(nick), Some(username), Some(hostname)) = (msg.nick(), msg.param(0), msg.param(1))
        else {
            return;
        };
        if let Some(user) = self.users.get_mut(nick) {
            user.username = username.to_owned();
            user.hostname = hostname.to_owned();
        }
        self.emit(Event::HostChanged {
            nick: nick.to_owned(),
            username: username.to_owned(),
            hostname: hostname.to_owned(),
        });
    }

    fn on_setname(&mut self, msg: &Message) {
        let (Some(nick), Some(realname)) = (msg.nick(), msg.param(0)) else {
            return;
        };
        if let Some(user) = self.users.get_mut(nick) {
            user.realname = realname.to_owned();
        }
        self.emit(Event::RealnameChanged {
            nick: nick.to_owned(),
            realname: realname.to_owned(),
        });
    }

    /// `FAIL <command> <code> [<context>...] <description>`
    fn on_standard_reply(&mut self, kind: StandardReplyKind, msg: &Message) {
        let [command, code, rest @ ..] = msg.params.as_slice() else {
            return;
        };
        let Some((description, context)) = rest.split_last() else {
            return;
        };
        self.emit(Event::StandardReply {
            kind,
            command: command.clone(),
            code: code.clone(),
            context: context.to_vec(),
            description: description.clone(),
        });
    }

    fn on_batch(&mut self, msg: &Message) {
        let Some(reference) = msg.param(0) else { return };

        if let Some(reference) = reference.strip_prefix('+') {
            let batch_type = msg.param(1).unwrap_or("").to_owned();
            let params: Vec<String> = msg.params.iter().skip(2).cloned().collect();
            debug!(%reference, %batch_type, "batch opened");
            self.batches.insert(
                reference.to_owned(),
                BatchInfo::new(reference, batch_type.clone(), params.clone()),
            );
            self.emit(Event::BatchStarted {
                reference: reference.to_owned(),
                batch_type,
                params,
            });
        } else if let Some(reference) = reference.strip_prefix('-') {
            let Some(batch) = self.batches.remove(reference) else {
                debug!(%reference, "close for unknown batch");
                return;
            };
            debug!(%reference, messages = batch.messages.len(), "batch closed");
            self.emit(Event::BatchEnded {
                reference: batch.reference,
                batch_type: batch.batch_type,
                messages: batch.messages,
            });
        }
    }

    /// Record an `account` tag on a known user.
    fn note_account_tag(&mut self, msg: &Message) {
        let (Some(nick), Some(account)) = (msg.nick(), msg.tag("account")) else {
            return;
        };
        if let Some(user) = self.users.get_mut(nick) {
            user.account = Some(account.to_owned());
        }
    }

    /// Drop a user record once we share no channel with them.
    fn forget_if_unshared(&mut self, nick: &str) {
        if !self.channels.values().any(|c| c.has_member(nick)) {
            self.users.remove(nick);
        }
    }
}
