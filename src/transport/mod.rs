//! The byte link to the IRC server.
//!
//! The client engine talks to the server only through the [`Transport`]
//! trait. Every method returns immediately: connecting, reading and
//! writing progress in the background and are observed through
//! [`Transport::poll`] and [`Transport::receive`].
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryTransport`] keeps everything in memory. Tests and simulations
//!   drive the server side through its [`MemoryPeer`] handle.
//! - [`TokioTransport`] (feature `tokio`) runs a TCP/TLS connection on a
//!   tokio runtime.

mod memory;
#[cfg(feature = "tokio")]
mod tcp;
#[cfg(feature = "tokio")]
mod driver;

use std::fmt;
use std::net::IpAddr;

use bytes::BytesMut;

use crate::error::TransportError;

pub use self::memory::{MemoryPeer, MemoryTransport};
#[cfg(feature = "tokio")]
pub use self::driver::{run, DEFAULT_POLL_INTERVAL};
#[cfg(feature = "tokio")]
pub use self::tcp::TokioTransport;

/// State of the link as seen by the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TransportStatus {
    /// No connection open or in flight.
    #[default]
    Idle,
    Connecting,
    Connected,
    /// The link failed or was closed by the peer.
    Error(String),
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Non-blocking byte transport to an IRC server.
pub trait Transport: Send {
    /// Begin connecting. Completion is reported by [`poll`](Self::poll).
    fn connect(&mut self, host: &str, port: u16, tls: bool) -> Result<(), TransportError>;

    /// Current link state.
    fn poll(&mut self) -> TransportStatus;

    /// Queue bytes for the server. Returns how many were accepted.
    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Append whatever has arrived to `buf`. Returns the number of bytes
    /// appended; zero when nothing is waiting.
    fn receive(&mut self, buf: &mut BytesMut) -> Result<usize, TransportError>;

    /// Drop the link. Safe to call when already closed.
    fn close(&mut self);

    /// Whether [`connect`](Self::connect) can honour `tls = true`.
    fn supports_tls(&self) -> bool;

    /// Local address of the open link, used for DCC offers.
    fn local_addr(&self) -> Option<IpAddr>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, host: &str, port: u16, tls: bool) -> Result<(), TransportError> {
        (**self).connect(host, port, tls)
    }

    fn poll(&mut self) -> TransportStatus {
        (**self).poll()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).send(data)
    }

    fn receive(&mut self, buf: &mut BytesMut) -> Result<usize, TransportError> {
        (**self).receive(buf)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn supports_tls(&self) -> bool {
        (**self).supports_tls()
    }

    fn local_addr(&self) -> Option<IpAddr> {
        (**self).local_addr()
    }
}
