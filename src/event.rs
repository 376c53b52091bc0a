//! Domain events reported to the host.
//!
//! The client never calls back into the host. Everything it observes is
//! queued as an [`Event`] and drained with
//! [`Client::poll_event`](crate::Client::poll_event) after each `poll()`.

use crate::message::{Message, Tag};

/// Connection lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionStatus {
    /// No transport open.
    #[default]
    Disconnected,
    /// Transport connect in flight.
    Connecting,
    /// Transport open, CAP/SASL/NICK/USER in progress.
    Registering,
    /// 001 received.
    Connected,
    /// Transport failure; the reconnect manager may pick up from here.
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Registering => "registering",
            Self::Connected => "connected",
            Self::Error => "error",
        })
    }
}

/// A PRIVMSG, NOTICE or ACTION as seen by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChatMessage {
    /// Sender nickname (or server name).
    pub sender: String,
    /// Channel or our own nick.
    pub target: String,
    /// Message text; for actions, the text after `ACTION`.
    pub text: String,
    /// Tags carried by the line.
    pub tags: Vec<Tag>,
}

/// Kind of an IRCv3 standard reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StandardReplyKind {
    Fail,
    Warn,
    Note,
}

/// Everything the engine reports.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Event {
    StatusChanged(ConnectionStatus),
    /// Registration completed (001).
    Connected,
    Disconnected(String),
    ConnectionError(String),
    Reconnecting {
        attempt: u32,
        delay_secs: u64,
        host: String,
        port: u16,
    },
    /// Every raw line, before parsing.
    MessageReceived(String),
    /// Server `ERROR` line.
    ServerError(String),

    Privmsg(ChatMessage),
    Notice(ChatMessage),
    Action(ChatMessage),
    Highlighted(ChatMessage),
    CtcpReceived {
        sender: String,
        target: String,
        command: String,
        params: String,
    },
    CtcpReply {
        sender: String,
        command: String,
        params: String,
    },

    Joined {
        channel: String,
    },
    Parted {
        channel: String,
        message: String,
    },
    Kicked {
        channel: String,
        by: String,
        reason: String,
    },
    UserJoined {
        channel: String,
        nick: String,
        account: Option<String>,
        realname: Option<String>,
    },
    UserParted {
        channel: String,
        nick: String,
        message: String,
    },
    UserKicked {
        channel: String,
        nick: String,
        by: String,
        reason: String,
    },
    UserQuit {
        nick: String,
        message: String,
    },
    NickChanged {
        old: String,
        new: String,
    },
    ModeChanged {
        target: String,
        modes: String,
        params: Vec<String>,
    },
    TopicChanged {
        channel: String,
        topic: String,
        setter: String,
    },
    UserAway {
        nick: String,
        message: Option<String>,
    },
    AccountChanged {
        nick: String,
        account: Option<String>,
    },
    HostChanged {
        nick: String,
        username: String,
        hostname: String,
    },
    RealnameChanged {
        nick: String,
        realname: String,
    },
    Invited {
        channel: String,
        by: String,
    },
    NamesEnd {
        channel: String,
    },
    Motd(String),
    MotdEnd,
    NumericReceived {
        code: u16,
        params: Vec<String>,
    },
    NickInUse(String),
    MonitorOnline(Vec<String>),
    MonitorOffline(Vec<String>),
    StandardReply {
        kind: StandardReplyKind,
        command: String,
        code: String,
        context: Vec<String>,
        description: String,
    },

    CapabilityList(Vec<String>),
    CapabilityAcknowledged(Vec<String>),
    CapabilityDenied(Vec<String>),
    SaslSuccess,
    SaslFailed(String),

    BatchStarted {
        reference: String,
        batch_type: String,
        params: Vec<String>,
    },
    BatchEnded {
        reference: String,
        batch_type: String,
        messages: Vec<Message>,
    },

    DccRequest {
        index: usize,
        nick: String,
        filename: String,
        size: u64,
    },
    DccProgress {
        index: usize,
        transferred: u64,
        size: u64,
    },
    DccCompleted {
        index: usize,
    },
    DccFailed {
        index: usize,
        reason: String,
    },

    /// Round trip of our last `PING`, in milliseconds.
    LatencyMeasured(u64),
}
