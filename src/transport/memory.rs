//! In-memory transport.

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::BytesMut;
use tracing::trace;

use super::{Transport, TransportStatus};
use crate::error::TransportError;

#[derive(Debug)]
struct Link {
    status: TransportStatus,
    /// Bytes the server sent, not yet received by the client.
    inbound: BytesMut,
    /// Bytes the client sent.
    written: Vec<u8>,
    attempts: Vec<(String, u16, bool)>,
    auto_connect: bool,
    refuse_next: Option<String>,
    receive_error: Option<String>,
    tls_supported: bool,
    local_addr: Option<IpAddr>,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            status: TransportStatus::Idle,
            inbound: BytesMut::new(),
            written: Vec::new(),
            attempts: Vec::new(),
            auto_connect: true,
            refuse_next: None,
            receive_error: None,
            tls_supported: true,
            local_addr: Some(Ipv4Addr::LOCALHOST.into()),
        }
    }
}

type Shared = Arc<Mutex<Link>>;

fn lock(link: &Shared) -> MutexGuard<'_, Link> {
    link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A [`Transport`] backed by in-memory buffers.
///
/// By default `connect` succeeds at once. Use the [`MemoryPeer`] from
/// [`peer`](Self::peer) to play the server.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    link: Shared,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle on the server side of this transport.
    pub fn peer(&self) -> MemoryPeer {
        MemoryPeer {
            link: self.link.clone(),
        }
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, host: &str, port: u16, tls: bool) -> Result<(), TransportError> {
        let mut link = lock(&self.link);
        link.attempts.push((host.to_owned(), port, tls));
        if tls && !link.tls_supported {
            return Err(TransportError::TlsUnavailable);
        }
        if let Some(reason) = link.refuse_next.take() {
            link.status = TransportStatus::Error(reason.clone());
            return Err(TransportError::Connect {
                host: host.to_owned(),
                port,
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, reason),
            });
        }
        link.inbound.clear();
        link.status = if link.auto_connect {
            TransportStatus::Connected
        } else {
            TransportStatus::Connecting
        };
        Ok(())
    }

    fn poll(&mut self) -> TransportStatus {
        lock(&self.link).status.clone()
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut link = lock(&self.link);
        if link.status != TransportStatus::Connected {
            return Err(TransportError::NotConnected);
        }
        link.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn receive(&mut self, buf: &mut BytesMut) -> Result<usize, TransportError> {
        let mut link = lock(&self.link);
        if let Some(reason) = link.receive_error.take() {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                reason,
            )));
        }
        let n = link.inbound.len();
        if n > 0 {
            trace!(bytes = n, "memory transport delivering");
            buf.extend_from_slice(&link.inbound.split());
        }
        Ok(n)
    }

    fn close(&mut self) {
        let mut link = lock(&self.link);
        link.status = TransportStatus::Idle;
        link.inbound.clear();
    }

    fn supports_tls(&self) -> bool {
        lock(&self.link).tls_supported
    }

    fn local_addr(&self) -> Option<IpAddr> {
        lock(&self.link).local_addr
    }
}

/// The server side of a [`MemoryTransport`].
#[derive(Clone, Debug)]
pub struct MemoryPeer {
    link: Shared,
}

impl MemoryPeer {
    /// Send one line to the client; CRLF is appended.
    pub fn send_line(&self, line: &str) {
        let mut link = lock(&self.link);
        link.inbound.extend_from_slice(line.as_bytes());
        link.inbound.extend_from_slice(b"\r\n");
    }

    /// Send raw bytes to the client.
    pub fn send_bytes(&self, bytes: &[u8]) {
        lock(&self.link).inbound.extend_from_slice(bytes);
    }

    /// Everything the client wrote since the last call.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.link).written)
    }

    /// Lines the client wrote since the last call, without CRLF.
    pub fn take_lines(&self) -> Vec<String> {
        let written = self.take_written();
        String::from_utf8_lossy(&written)
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// `(host, port, tls)` of every connect call so far.
    pub fn connect_attempts(&self) -> Vec<(String, u16, bool)> {
        lock(&self.link).attempts.clone()
    }

    /// When false, `connect` leaves the link in `Connecting` until
    /// [`complete_connect`](Self::complete_connect).
    pub fn set_auto_connect(&self, auto: bool) {
        lock(&self.link).auto_connect = auto;
    }

    pub fn complete_connect(&self) {
        lock(&self.link).status = TransportStatus::Connected;
    }

    /// Make the next `connect` call fail.
    pub fn refuse_next_connect(&self, reason: impl Into<String>) {
        lock(&self.link).refuse_next = Some(reason.into());
    }

    /// Break the link.
    pub fn fail(&self, reason: impl Into<String>) {
        lock(&self.link).status = TransportStatus::Error(reason.into());
    }

    /// Make the next `receive` call fail while the link still reports
    /// itself connected.
    pub fn fail_next_receive(&self, reason: impl Into<String>) {
        lock(&self.link).receive_error = Some(reason.into());
    }

    pub fn set_tls_supported(&self, supported: bool) {
        lock(&self.link).tls_supported = supported;
    }

    pub fn set_local_addr(&self, addr: Option<IpAddr>) {
        lock(&self.link).local_addr = addr;
    }

    pub fn status(&self) -> TransportStatus {
        lock(&self.link).status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_requires_connection() {
        let mut transport = MemoryTransport::new();
        assert!(matches!(
            transport.send(b"x"),
            Err(TransportError::NotConnected)
        ));
    }

    #[test]
    fn test_receive_drains_inbound() {
        let mut transport = MemoryTransport::new();
        let peer = transport.peer();
        transport.connect("irc.test", 6697, true).unwrap();
        peer.send_line("PING :a");
        peer.send_bytes(b"PING :b\r\n");

        let mut buf = BytesMut::new();
        assert_eq!(transport.receive(&mut buf).unwrap(), 18);
        assert_eq!(&buf[..], b"PING :a\r\nPING :b\r\n");
        assert_eq!(transport.receive(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_manual_connect_and_failures() {
        let mut transport = MemoryTransport::new();
        let peer = transport.peer();
        peer.set_auto_connect(false);
        transport.connect("irc.test", 6667, false).unwrap();
        assert_eq!(transport.poll(), TransportStatus::Connecting);
        peer.complete_connect();
        assert_eq!(transport.poll(), TransportStatus::Connected);

        peer.fail("reset");
        assert_eq!(transport.poll(), TransportStatus::Error("reset".to_string()));

        peer.refuse_next_connect("refused");
        assert!(transport.connect("irc.test", 6667, false).is_err());
        peer.set_tls_supported(false);
        assert!(matches!(
            transport.connect("irc.test", 6697, true),
            Err(TransportError::TlsUnavailable)
        ));
        assert_eq!(peer.connect_attempts().len(), 3);
    }
}
