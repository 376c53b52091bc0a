//! # slirc-client
//!
//! A sans-IO IRC client engine. The [`Client`] state machine handles
//! registration, IRCv3 capability negotiation, SASL, channel and user
//! tracking, flood control, reconnection and DCC file transfers. It never
//! blocks: the host calls [`Client::poll`] on a fixed cadence and drains
//! [`Event`]s.
//!
//! ## Features
//!
//! - IRC line codec with IRCv3 message tags and CTCP
//! - `CAP LS 302` negotiation, cap-notify, SASL PLAIN/EXTERNAL and STS
//! - Token-bucket outbound scheduler with urgent priority for PONG
//! - Exponential-backoff reconnection with fallback servers
//! - DCC SEND in both directions over pluggable sockets
//! - UTF-8, Latin-1 and Windows-1252 links with auto-detection
//! - Optional Tokio transport (TCP + rustls) and polling driver
//! - Optional serde support for configuration types

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ```rust
//! use slirc_client::transport::MemoryTransport;
//! use slirc_client::{Client, ClientConfig, Event, ServerAddress};
//!
//! let transport = MemoryTransport::new();
//! let server = transport.peer();
//! let mut client = Client::new(ClientConfig::default(), Box::new(transport));
//!
//! client.connect(ServerAddress::plain("irc.example.net")).unwrap();
//! client.poll();
//! server.send_line(":irc.example.net CAP * LS :");
//! server.send_line(":irc.example.net 001 slirc :Welcome");
//! client.poll();
//!
//! client.join("#rust", None);
//! client.poll();
//! assert!(server.take_lines().contains(&"JOIN #rust".to_string()));
//!
//! while let Some(event) = client.poll_event() {
//!     if let Event::Privmsg(msg) = event {
//!         println!("<{}> {}", msg.sender, msg.text);
//!     }
//! }
//! ```
//!
//! ### Working with messages
//!
//! ```rust
//! use slirc_client::Message;
//!
//! let msg = Message::parse("@msgid=42 :nick!user@host PRIVMSG #channel :Hello!");
//! assert_eq!(msg.tag("msgid"), Some("42"));
//! assert_eq!(msg.nick(), Some("nick"));
//!
//! let typing = Message::tagmsg("#channel").with_tag("+typing", Some("active"));
//! assert_eq!(typing.to_string(), "@+typing=active TAGMSG :#channel");
//! ```

pub mod caps;
pub mod casemap;
pub mod client;
pub mod clock;
pub mod ctcp;
pub mod dcc;
pub mod encoding;
pub mod error;
pub mod event;
pub mod format;
pub mod ircv3;
pub mod isupport;
pub mod message;
pub mod reconnect;
pub mod sasl;
pub mod scheduler;
pub mod transport;
pub mod util;

pub use self::caps::{CapNegotiator, StsCache, StsPolicy, DEFAULT_CAPS};
pub use self::casemap::{irc_eq, irc_to_lower, CaseMapping};
pub use self::client::{
    AutoJoinChannel, Channel, Client, ClientConfig, ConnectionStats, HistoryAnchor, User,
};
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::ctcp::{encode_ctcp, Ctcp};
pub use self::dcc::{DccDirection, DccOffer, DccStatus, DccTransfer};
pub use self::encoding::TextEncoding;
pub use self::error::{ClientError, DccError, Result, TransportError};
pub use self::event::{ChatMessage, ConnectionStatus, Event, StandardReplyKind};
pub use self::isupport::Isupport;
pub use self::message::{Message, Tag};
pub use self::reconnect::{ReconnectConfig, ServerAddress};
pub use self::sasl::{SaslConfig, SaslMechanism};
pub use self::scheduler::{FloodControl, Scheduler};
pub use self::transport::{Transport, TransportStatus};
