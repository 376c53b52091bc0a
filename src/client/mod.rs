//! The session state machine.
//!
//! [`Client`] owns one IRC session at a time. It does no I/O of its own:
//! bytes move through the [`Transport`], DCC sockets through a
//! [`DccNetwork`], and time comes from a [`Clock`]. The host calls
//! [`Client::poll`] on a fixed cadence (the tokio driver uses 50 ms) and
//! drains [`Event`]s afterwards.
//!
//! ```
//! use slirc_client::transport::MemoryTransport;
//! use slirc_client::{Client, ClientConfig, Event, ServerAddress};
//!
//! let transport = MemoryTransport::new();
//! let server = transport.peer();
//! let mut client = Client::new(ClientConfig::default(), Box::new(transport));
//!
//! client.connect(ServerAddress::plain("irc.example.net")).unwrap();
//! client.poll();
//! assert_eq!(server.take_lines(), vec!["CAP LS 302"]);
//!
//! server.send_line(":irc.example.net CAP * LS :");
//! server.send_line(":irc.example.net 001 slirc :Welcome");
//! client.poll();
//! assert!(client.is_connected());
//! assert!(client.drain_events().contains(&Event::Connected));
//! ```

mod batch;
mod channel;
mod commands;
mod config;
mod extras;
mod handlers;
mod numerics;
mod settings;
mod stats;
mod transfers;
mod user;

pub use self::batch::BatchInfo;
pub use self::channel::{split_member_prefix, Channel, MEMBER_PREFIXES};
pub use self::commands::HistoryAnchor;
pub use self::config::{AutoJoinChannel, ClientConfig};
pub use self::stats::ConnectionStats;
pub use self::user::User;

use std::collections::{BTreeSet, HashMap, VecDeque};

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use self::stats::Counters;
use crate::caps::{CapAction, CapNegotiator, Registration, StsCache};
use crate::casemap::CaseMapping;
use crate::clock::{Clock, SystemClock};
use crate::dcc::{DccNetwork, DccTransfer, StdDccNetwork};
use crate::encoding::StreamDecoder;
use crate::error::Result;
use crate::event::{ChatMessage, ConnectionStatus, Event};
use crate::isupport::Isupport;
use crate::message::Message;
use crate::reconnect::{ReconnectManager, ServerAddress};
use crate::scheduler::{Scheduler, PRIORITY_NORMAL};
use crate::transport::{Transport, TransportStatus};
use crate::util::has_protocol_control;

/// An IRC client session.
pub struct Client {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    clock: Box<dyn Clock>,
    dcc_network: Box<dyn DccNetwork>,

    status: ConnectionStatus,
    events: VecDeque<Event>,
    current_nick: String,
    alt_nick_index: usize,
    /// Where the current session is connected, after STS.
    server: Option<ServerAddress>,
    /// Set by an explicit `disconnect()`; keeps the reconnect manager idle
    /// until the host connects again.
    reconnect_suspended: bool,

    caps: CapNegotiator,
    sts: StsCache,
    scheduler: Scheduler,
    reconnect: ReconnectManager,
    decoder: StreamDecoder,
    recv_buf: BytesMut,
    line_buf: String,
    isupport: Isupport,

    channels: HashMap<String, Channel>,
    users: HashMap<String, User>,
    batches: HashMap<String, BatchInfo>,
    monitored: BTreeSet<String>,
    channel_keys: HashMap<String, String>,
    away_message: Option<String>,

    history: VecDeque<ChatMessage>,
    tracked: HashMap<String, String>,
    tracked_order: VecDeque<String>,
    counters: Counters,
    last_activity_ms: u64,
    last_ping_sent_ms: Option<u64>,

    transfers: Vec<DccTransfer>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("status", &self.status)
            .field("nick", &self.current_nick)
            .field("server", &self.server)
            .field("channels", &self.channels.len())
            .field("queued", &self.scheduler.len())
            .field("transfers", &self.transfers.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client using the system clock and real DCC sockets.
    pub fn new(config: ClientConfig, transport: Box<dyn Transport>) -> Self {
        Self::with_clock(config, transport, Box::new(SystemClock::new()))
    }

    /// Create a client with a custom time source.
    pub fn with_clock(
        config: ClientConfig,
        transport: Box<dyn Transport>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let mut reconnect = ReconnectManager::new(config.reconnect);
        for server in &config.fallback_servers {
            reconnect.add_fallback(server.clone());
        }
        let caps = CapNegotiator::new(config.request_caps.clone(), config.sasl.clone());
        let scheduler = Scheduler::new(config.flood_control);
        let decoder = StreamDecoder::new(config.encoding, config.auto_detect_encoding);
        let last_activity_ms = clock.now_ms();

        Self {
            current_nick: config.nickname.clone(),
            config,
            transport,
            clock,
            dcc_network: Box::new(StdDccNetwork::new()),
            status: ConnectionStatus::Disconnected,
            events: VecDeque::new(),
            alt_nick_index: 0,
            server: None,
            reconnect_suspended: false,
            caps,
            sts: StsCache::new(),
            scheduler,
            reconnect,
            decoder,
            recv_buf: BytesMut::with_capacity(4096),
            line_buf: String::new(),
            isupport: Isupport::new(),
            channels: HashMap::new(),
            users: HashMap::new(),
            batches: HashMap::new(),
            monitored: BTreeSet::new(),
            channel_keys: HashMap::new(),
            away_message: None,
            history: VecDeque::new(),
            tracked: HashMap::new(),
            tracked_order: VecDeque::new(),
            counters: Counters::default(),
            last_activity_ms,
            last_ping_sent_ms: None,
            transfers: Vec::new(),
        }
    }

    /// Replace the DCC socket layer.
    #[must_use]
    pub fn with_dcc_network(mut self, network: Box<dyn DccNetwork>) -> Self {
        self.dcc_network = network;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open a new session to `server`, closing any current one.
    ///
    /// A cached STS policy upgrades a plaintext target to TLS. The target
    /// becomes the primary server for reconnects. On failure the session is
    /// left in [`ConnectionStatus::Error`] and the error is also reported as
    /// [`Event::ConnectionError`].
    pub fn connect(&mut self, server: ServerAddress) -> Result<()> {
        self.reconnect_suspended = false;
        self.reconnect.set_primary(server.clone());
        self.open(server)
    }

    /// End the session.
    ///
    /// With a message, `QUIT :message` is written at once, ahead of
    /// anything still queued. Automatic reconnection stays off until the
    /// next [`connect`](Self::connect).
    pub fn disconnect(&mut self, quit_message: Option<&str>) {
        self.reconnect_suspended = true;
        if self.status == ConnectionStatus::Disconnected {
            return;
        }
        if let Some(message) = quit_message {
            if self.transport.poll() == TransportStatus::Connected {
                self.write_line(&format!("QUIT :{message}"));
            }
        }
        self.teardown();
        self.set_status(ConnectionStatus::Disconnected);
        let reason = quit_message.unwrap_or("Disconnected by client").to_owned();
        self.emit(Event::Disconnected(reason));
    }

    /// Advance the session by one step.
    ///
    /// Order: reconnect (when down), DCC transfers, transport state,
    /// received lines, one scheduled send, ping watchdog.
    pub fn poll(&mut self) {
        let now = self.clock.now_ms();
        if matches!(
            self.status,
            ConnectionStatus::Disconnected | ConnectionStatus::Error
        ) {
            if !self.reconnect_suspended {
                self.poll_reconnect(now);
            }
            return;
        }

        self.poll_transfers();

        match self.transport.poll() {
            TransportStatus::Connected => {}
            TransportStatus::Connecting => return,
            TransportStatus::Error(reason) => {
                self.connection_lost(&reason);
                return;
            }
            TransportStatus::Idle => {
                self.connection_lost("transport closed");
                return;
            }
        }

        if self.status == ConnectionStatus::Connecting {
            self.set_status(ConnectionStatus::Registering);
            self.last_activity_ms = now;
            let actions = self.caps.start(self.registration());
            self.apply_cap_actions(actions);
        }

        self.receive(now);
        if self.status == ConnectionStatus::Error {
            return;
        }

        if let Some(line) = self.scheduler.drain(self.clock.now_ms()) {
            self.write_line(&line);
        }

        self.check_ping_timeout();
    }

    /// Next queued event.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// True once 001 has been received.
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn current_nick(&self) -> &str {
        &self.current_nick
    }

    /// The server of the current session.
    pub fn server(&self) -> Option<&ServerAddress> {
        self.server.as_ref()
    }

    fn open(&mut self, target: ServerAddress) -> Result<()> {
        if self.status != ConnectionStatus::Disconnected {
            self.teardown();
        }
        let target = self.apply_sts(target);
        debug!(%target, "connecting");

        if let Err(e) = self.transport.connect(&target.host, target.port, target.tls) {
            warn!(%target, error = %e, "connect failed");
            self.server = Some(target);
            self.emit(Event::ConnectionError(e.to_string()));
            self.set_status(ConnectionStatus::Error);
            return Err(e.into());
        }

        self.server = Some(target);
        self.last_activity_ms = self.clock.now_ms();
        self.set_status(ConnectionStatus::Connecting);
        Ok(())
    }

    fn apply_sts(&self, target: ServerAddress) -> ServerAddress {
        if target.tls {
            return target;
        }
        let Some(policy) = self.sts.get(&target.host, self.clock.unix_time()) else {
            return target;
        };
        if !self.transport.supports_tls() {
            warn!(host = %target.host, "sts policy cached but transport cannot do tls");
            return target;
        }
        debug!(host = %target.host, port = policy.port, "sts upgrade");
        ServerAddress::new(target.host, policy.port, true)
    }

    fn poll_reconnect(&mut self, now: u64) {
        let Some(attempt) = self.reconnect.poll(now) else {
            return;
        };
        self.emit(Event::Reconnecting {
            attempt: attempt.attempt,
            delay_secs: attempt.delay_secs,
            host: attempt.target.host.clone(),
            port: attempt.target.port,
        });
        if let Err(e) = self.open(attempt.target) {
            debug!(attempt = attempt.attempt, error = %e, "reconnect attempt failed");
        }
    }

    /// Close the transport and forget everything tied to the session.
    fn teardown(&mut self) {
        self.transport.close();
        self.channels.clear();
        self.users.clear();
        self.batches.clear();
        self.monitored.clear();
        self.scheduler.clear();
        self.recv_buf.clear();
        self.line_buf.clear();
        self.caps.reset();
        self.isupport.clear();
        self.decoder = StreamDecoder::new(self.config.encoding, self.config.auto_detect_encoding);
        self.current_nick = self.config.nickname.clone();
        self.alt_nick_index = 0;
        self.away_message = None;
        self.last_ping_sent_ms = None;
        self.counters.connected_at_ms = None;
    }

    fn connection_lost(&mut self, reason: &str) {
        warn!(%reason, "connection lost");
        self.teardown();
        self.emit(Event::ConnectionError("Connection lost".to_owned()));
        self.set_status(ConnectionStatus::Error);
    }

    fn check_ping_timeout(&mut self) {
        let idle = self.clock.now_ms().saturating_sub(self.last_activity_ms);
        if idle <= self.config.ping_timeout_secs.saturating_mul(1000) {
            return;
        }
        warn!(idle_ms = idle, "ping timeout");
        self.teardown();
        self.set_status(ConnectionStatus::Disconnected);
        self.emit(Event::Disconnected("Ping timeout".to_owned()));
    }

    fn receive(&mut self, now: u64) {
        match self.transport.receive(&mut self.recv_buf) {
            Ok(_) => {}
            Err(e) => {
                self.connection_lost(&e.to_string());
                return;
            }
        }
        if self.recv_buf.is_empty() {
            return;
        }

        self.last_activity_ms = now;
        self.counters.bytes_received += self.recv_buf.len() as u64;
        let text = self.decoder.decode(&self.recv_buf);
        self.recv_buf.clear();
        self.line_buf.push_str(&text);

        while let Some(end) = self.line_buf.find('\n') {
            let raw: String = self.line_buf.drain(..=end).collect();
            let line = raw.trim_end_matches(['\r', '\n']);
            if !line.is_empty() {
                self.process_line(line);
            }
        }
    }

    fn process_line(&mut self, raw: &str) {
        trace!(line = raw, "<<");
        self.counters.messages_received += 1;
        self.emit(Event::MessageReceived(raw.to_owned()));

        let msg = Message::parse(raw);
        if msg.command.is_empty() {
            return;
        }

        if let Some(reference) = msg.tag("batch").map(str::to_owned) {
            if let Some(batch) = self.batches.get_mut(&reference) {
                batch.messages.push(msg);
                return;
            }
        }

        match msg.numeric() {
            Some(code) => self.handle_numeric(code, &msg),
            None => self.handle_command(&msg),
        }
    }

    /// Write one line now, bypassing the scheduler.
    fn write_line(&mut self, line: &str) -> bool {
        if has_protocol_control(line) {
            warn!(line = %line.escape_debug(), "outbound line contains CR, LF or NUL, dropped");
            return false;
        }
        let mut bytes = self.decoder.encoding().encode(line);
        bytes.extend_from_slice(b"\r\n");
        match self.transport.send(&bytes) {
            Ok(sent) => {
                trace!(line, ">>");
                self.counters.messages_sent += 1;
                self.counters.bytes_sent += sent as u64;
                if line.starts_with("PING ") {
                    self.last_ping_sent_ms = Some(self.clock.now_ms());
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to send line");
                false
            }
        }
    }

    fn enqueue(&mut self, line: String, priority: i32) {
        if has_protocol_control(&line) {
            warn!(line = %line.escape_debug(), "outbound line contains CR, LF or NUL, dropped");
            return;
        }
        self.scheduler.enqueue(line, priority);
    }

    fn send_line(&mut self, line: String) {
        self.enqueue(line, PRIORITY_NORMAL);
    }

    fn apply_cap_actions(&mut self, actions: Vec<CapAction>) {
        for action in actions {
            match action {
                CapAction::Send(line) => {
                    self.write_line(&line);
                }
                CapAction::Emit(event) => self.emit(event),
                CapAction::StsAdvertised(value) => {
                    if let Some(host) = self.server.as_ref().map(|s| s.host.clone()) {
                        let now = self.clock.unix_time();
                        self.sts.update(&host, &value, now);
                    }
                }
            }
        }
    }

    fn registration(&self) -> Registration {
        Registration::new(
            self.current_nick.clone(),
            self.config.username.clone(),
            self.config.realname.clone(),
        )
        .with_password(self.config.password.clone())
    }

    fn emit(&mut self, event: Event) {
        self.events.push_back(event);
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        debug!(from = %self.status, to = %status, "status changed");
        self.status = status;
        self.emit(Event::StatusChanged(status));
    }

    fn casemapping(&self) -> CaseMapping {
        CaseMapping::from_isupport(self.isupport.casemapping())
    }

    fn is_self(&self, nick: &str) -> bool {
        self.casemapping().equals(nick, &self.current_nick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::{MemoryPeer, MemoryTransport};

    fn client_with(config: ClientConfig) -> (Client, MemoryPeer, ManualClock) {
        let transport = MemoryTransport::new();
        let peer = transport.peer();
        let clock = ManualClock::new(1_700_000_000);
        let client = Client::with_clock(config, Box::new(transport), Box::new(clock.clone()));
        (client, peer, clock)
    }

    /// Connect and get through registration with no capabilities.
    fn registered(config: ClientConfig) -> (Client, MemoryPeer, ManualClock) {
        let (mut client, peer, clock) = client_with(config);
        client.connect(ServerAddress::plain("irc.test")).unwrap();
        client.poll();
        peer.send_line(":irc.test CAP * LS :");
        peer.send_line(":irc.test 001 slirc :Welcome");
        client.poll();
        assert!(client.is_connected());
        peer.take_lines();
        client.drain_events();
        (client, peer, clock)
    }

    #[test]
    fn test_registration_without_caps() {
        let (mut client, peer, _clock) = client_with(ClientConfig::default());
        client.connect(ServerAddress::plain("irc.test")).unwrap();
        assert_eq!(client.status(), ConnectionStatus::Connecting);

        client.poll();
        assert_eq!(client.status(), ConnectionStatus::Registering);
        assert_eq!(peer.take_lines(), vec!["CAP LS 302"]);

        peer.send_line(":irc.test CAP * LS :");
        client.poll();
        assert_eq!(
            peer.take_lines(),
            vec!["CAP END", "NICK slirc", "USER slirc 0 * :slirc-client user"]
        );

        peer.send_line(":irc.test 001 slirc_ :Welcome");
        client.poll();
        assert_eq!(client.current_nick(), "slirc_");
        let events = client.drain_events();
        assert!(events.contains(&Event::StatusChanged(ConnectionStatus::Connected)));
        assert!(events.contains(&Event::Connected));
    }

    #[test]
    fn test_pong_jumps_the_queue() {
        let (mut client, peer, _clock) = registered(ClientConfig::default());
        client.send_privmsg("#a", "one");
        client.send_privmsg("#a", "two");
        peer.send_line("PING :token");
        client.poll();
        assert_eq!(peer.take_lines(), vec!["PONG :token"]);
        client.poll();
        assert_eq!(peer.take_lines(), vec!["PRIVMSG #a :one"]);
    }

    #[test]
    fn test_nick_in_use_cycles_alternates() {
        let config = ClientConfig {
            alt_nicks: vec!["first".to_owned(), "second".to_owned()],
            ..ClientConfig::default()
        };
        let (mut client, peer, _clock) = client_with(config);
        client.connect(ServerAddress::plain("irc.test")).unwrap();
        client.poll();
        peer.send_line(":irc.test CAP * LS :");
        client.poll();
        peer.take_lines();

        peer.send_line(":irc.test 433 * slirc :Nickname is already in use");
        client.poll();
        assert_eq!(peer.take_lines(), vec!["NICK first"]);

        peer.send_line(":irc.test 433 * first :Nickname is already in use");
        client.poll();
        assert_eq!(peer.take_lines(), vec!["NICK second"]);

        peer.send_line(":irc.test 433 * second :Nickname is already in use");
        client.poll();
        let lines = peer.take_lines();
        assert_eq!(lines.len(), 1);
        let suffix = lines[0].strip_prefix("NICK first").unwrap();
        assert!(!suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()));
        assert!(client
            .drain_events()
            .contains(&Event::NickInUse("second".to_owned())));
    }

    #[test]
    fn test_ping_timeout_disconnects() {
        let config = ClientConfig {
            ping_timeout_secs: 10,
            ..ClientConfig::default()
        };
        let (mut client, _peer, clock) = registered(config);
        clock.advance_secs(10);
        client.poll();
        assert!(client.is_connected());

        clock.advance_secs(1);
        client.poll();
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert_eq!(
            client.drain_events().last(),
            Some(&Event::Disconnected("Ping timeout".to_owned()))
        );
    }

    #[test]
    fn test_disconnect_sends_quit_and_clears_session() {
        let config = ClientConfig {
            reconnect: crate::reconnect::ReconnectConfig {
                enabled: true,
                ..Default::default()
            },
            ..ClientConfig::default()
        };
        let (mut client, peer, clock) = registered(config);
        peer.send_line(":slirc!u@h JOIN #rust");
        peer.send_line(":ferris!f@h JOIN #rust");
        client.poll();
        assert_eq!(client.joined_channels(), vec!["#rust"]);
        assert!(client.user("ferris").is_some());
        client.send_privmsg("#rust", "still queued");

        client.disconnect(Some("bye"));
        assert_eq!(peer.take_lines(), vec!["QUIT :bye"]);
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert!(client.joined_channels().is_empty());
        assert!(client.user("ferris").is_none());
        assert_eq!(
            client.drain_events().last(),
            Some(&Event::Disconnected("bye".to_owned()))
        );

        clock.advance_secs(60);
        client.poll();
        assert_eq!(peer.connect_attempts().len(), 1);
        assert!(peer.take_lines().is_empty());
    }

    #[test]
    fn test_lost_link_reconnects() {
        let config = ClientConfig {
            reconnect: crate::reconnect::ReconnectConfig {
                enabled: true,
                base_delay_secs: 5,
                max_attempts: -1,
            },
            ..ClientConfig::default()
        };
        let (mut client, peer, _clock) = registered(config);
        peer.fail("reset by peer");
        client.poll();
        assert_eq!(client.status(), ConnectionStatus::Error);
        assert!(client
            .drain_events()
            .contains(&Event::ConnectionError("Connection lost".to_owned())));

        client.poll();
        assert_eq!(client.status(), ConnectionStatus::Connecting);
        assert_eq!(
            client.drain_events()[0],
            Event::Reconnecting {
                attempt: 1,
                delay_secs: 5,
                host: "irc.test".to_owned(),
                port: 6667,
            }
        );
        assert_eq!(peer.connect_attempts().len(), 2);
    }

    #[test]
    fn test_batch_collects_tagged_lines() {
        let (mut client, peer, _clock) = registered(ClientConfig::default());
        peer.send_line(":irc.test BATCH +abc chathistory #rust");
        peer.send_line("@batch=abc :ferris!f@h PRIVMSG #rust :old news");
        peer.send_line(":irc.test BATCH -abc");
        client.poll();

        let events = client.drain_events();
        assert!(!events.iter().any(|e| matches!(e, Event::Privmsg(_))));
        let ended = events
            .iter()
            .find_map(|e| match e {
                Event::BatchEnded {
                    batch_type,
                    messages,
                    ..
                } => Some((batch_type.clone(), messages.len())),
                _ => None,
            })
            .unwrap();
        assert_eq!(ended, ("chathistory".to_owned(), 1));
    }

    #[test]
    fn test_partial_lines_wait_for_newline() {
        let (mut client, peer, _clock) = registered(ClientConfig::default());
        peer.send_bytes(b":ferris!f@h PRIVMSG slirc :hel");
        client.poll();
        assert!(!client
            .drain_events()
            .iter()
            .any(|e| matches!(e, Event::Privmsg(_))));

        peer.send_bytes(b"lo\r\n");
        client.poll();
        let events = client.drain_events();
        let text = events.iter().find_map(|e| match e {
            Event::Privmsg(chat) => Some(chat.text.clone()),
            _ => None,
        });
        assert_eq!(text.as_deref(), Some("hello"));
    }
}
