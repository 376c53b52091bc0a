//! DCC SEND file transfers.
//!
//! A [`DccTransfer`] is a small state machine advanced by
//! [`DccTransfer::poll`], one step per client poll. It owns its file handle
//! and socket; the [`DccNetwork`] trait supplies the sockets so tests can
//! run transfers entirely in memory.
//!
//! ```text
//! Receive: Pending --accept--> Connecting --connected--> Transferring --> Completed
//! Send:    Connecting --peer accepted--> Transferring --> Completed
//! Any non-terminal state --cancel--> Cancelled, any I/O error --> Failed
//! ```

mod memory;
mod net;
mod sanitize;

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{debug, warn};

use crate::error::DccError;

pub use self::memory::{MemoryDccNetwork, MemoryDccPeer};
pub use self::net::{DccListener, DccNetwork, DccStream, StdDccNetwork};
pub use self::sanitize::{sanitize_filename, MAX_FILENAME_LEN};

/// Bytes moved per poll.
pub const CHUNK_SIZE: usize = 4096;

/// Which way the file travels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DccDirection {
    Send,
    Receive,
}

impl DccDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }
}

/// Lifecycle of a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DccStatus {
    /// Offer received, waiting for the host to accept or reject.
    Pending,
    Connecting,
    Transferring,
    Completed,
    Failed,
    Cancelled,
}

impl DccStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for DccStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Connecting => "connecting",
            Self::Transferring => "transferring",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Parse a DCC address: IPv6 text, dotted IPv4, or IPv4 as a decimal u32.
pub fn parse_address(s: &str) -> Option<IpAddr> {
    if s.contains(':') {
        s.parse::<Ipv6Addr>().ok().map(IpAddr::V6)
    } else if s.contains('.') {
        s.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
    } else {
        s.parse::<u32>().ok().map(|n| IpAddr::V4(Ipv4Addr::from(n)))
    }
}

/// Address as written in an offer: IPv4 as a decimal u32, IPv6 as text.
pub fn encode_address(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => u32::from(v4).to_string(),
        IpAddr::V6(v6) => v6.to_string(),
    }
}

/// A `DCC SEND` offer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DccOffer {
    /// Filename as offered, before sanitizing.
    pub filename: String,
    pub addr: IpAddr,
    pub port: u16,
    pub size: u64,
}

impl DccOffer {
    /// Parse the CTCP parameters of a DCC request, e.g.
    /// `SEND "my file.txt" 3232235777 5000 1024`.
    ///
    /// # Example
    ///
    /// ```
    /// use slirc_client::dcc::DccOffer;
    ///
    /// let offer = DccOffer::parse("SEND report.pdf 2130706433 5000 1024").unwrap();
    /// assert_eq!(offer.addr.to_string(), "127.0.0.1");
    /// assert_eq!(offer.size, 1024);
    /// ```
    pub fn parse(params: &str) -> Result<Self, DccError> {
        let invalid = || DccError::InvalidOffer(params.to_owned());

        let rest = params.trim_start();
        let (kind, rest) = rest.split_once(' ').ok_or_else(invalid)?;
        if !kind.eq_ignore_ascii_case("SEND") {
            return Err(invalid());
        }

        let rest = rest.trim_start();
        let (filename, rest) = match rest.strip_prefix('"') {
            Some(quoted) => {
                let end = quoted.find('"').ok_or_else(invalid)?;
                (&quoted[..end], &quoted[end + 1..])
            }
            None => rest.split_once(' ').ok_or_else(invalid)?,
        };

        let mut fields = rest.split_whitespace();
        let addr = fields.next().and_then(parse_address).ok_or_else(invalid)?;
        let port = fields
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(invalid)?;
        let size = fields
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(invalid)?;

        if filename.is_empty() {
            return Err(invalid());
        }
        // Reverse (passive) DCC advertises port 0 and a token.
        if port == 0 {
            return Err(DccError::InvalidOffer(format!(
                "passive dcc is not supported: {params}"
            )));
        }

        Ok(Self {
            filename: filename.to_owned(),
            addr,
            port,
            size,
        })
    }

    /// CTCP parameters announcing this offer.
    pub fn to_ctcp_params(&self) -> String {
        let name = if self.filename.contains(' ') {
            format!("\"{}\"", self.filename)
        } else {
            self.filename.clone()
        };
        format!(
            "SEND {} {} {} {}",
            name,
            encode_address(self.addr),
            self.port,
            self.size
        )
    }
}

/// Write as much of `buf` as the stream accepts without blocking.
fn flush_some(stream: &mut dyn DccStream, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut written = 0;
    while written < buf.len() {
        match stream.write(&buf[written..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    buf.drain(..written);
    Ok(written)
}

/// One DCC SEND transfer, in either direction.
pub struct DccTransfer {
    direction: DccDirection,
    status: DccStatus,
    nick: String,
    filename: String,
    size: u64,
    transferred: u64,
    resume_offset: u64,
    addr: IpAddr,
    port: u16,
    error: Option<String>,
    reported: Option<u64>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    listener: Option<Box<dyn DccListener>>,
    stream: Option<Box<dyn DccStream>>,
    /// File bytes read but not yet accepted by the socket (send side), or
    /// acks not yet written (receive side).
    outbox: Vec<u8>,
}

impl fmt::Debug for DccTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DccTransfer")
            .field("direction", &self.direction)
            .field("status", &self.status)
            .field("nick", &self.nick)
            .field("filename", &self.filename)
            .field("size", &self.size)
            .field("transferred", &self.transferred)
            .field("addr", &self.addr)
            .field("port", &self.port)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl DccTransfer {
    fn new(direction: DccDirection, status: DccStatus, nick: String, offer: DccOffer) -> Self {
        Self {
            direction,
            status,
            nick,
            filename: offer.filename,
            size: offer.size,
            transferred: 0,
            resume_offset: 0,
            addr: offer.addr,
            port: offer.port,
            error: None,
            reported: None,
            reader: None,
            writer: None,
            listener: None,
            stream: None,
            outbox: Vec::new(),
        }
    }

    /// A pending receive for an offer from `nick`. The filename is
    /// sanitized.
    pub fn incoming(nick: impl Into<String>, offer: DccOffer) -> Self {
        let offer = DccOffer {
            filename: sanitize_filename(&offer.filename),
            ..offer
        };
        Self::new(DccDirection::Receive, DccStatus::Pending, nick.into(), offer)
    }

    /// Start sending `reader` (holding `size` bytes) to `nick`: listen on an
    /// ephemeral port and wait for the peer to connect.
    pub fn outgoing(
        nick: impl Into<String>,
        filename: &str,
        size: u64,
        reader: Box<dyn Read + Send>,
        local_ip: IpAddr,
        network: &mut dyn DccNetwork,
    ) -> Result<Self, DccError> {
        let listener = network.listen(local_ip)?;
        let offer = DccOffer {
            filename: sanitize_filename(filename),
            addr: local_ip,
            port: listener.local_port(),
            size,
        };
        let mut transfer = Self::new(DccDirection::Send, DccStatus::Connecting, nick.into(), offer);
        transfer.reader = Some(reader);
        transfer.listener = Some(listener);
        debug!(nick = %transfer.nick, port = transfer.port, size, "dcc send offered");
        Ok(transfer)
    }

    pub fn direction(&self) -> DccDirection {
        self.direction
    }

    pub fn status(&self) -> DccStatus {
        self.status
    }

    /// The other side.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn resume_offset(&self) -> u64 {
        self.resume_offset
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Why the transfer failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Completed fraction, `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.size == 0 {
            return 1.0;
        }
        (self.transferred as f64 / self.size as f64).min(1.0)
    }

    /// The offer to announce for an outgoing transfer.
    pub fn offer(&self) -> DccOffer {
        DccOffer {
            filename: self.filename.clone(),
            addr: self.addr,
            port: self.port,
            size: self.size,
        }
    }

    fn require(&self, direction: DccDirection, status: DccStatus) -> Result<(), DccError> {
        if self.direction != direction {
            return Err(DccError::WrongDirection(self.direction.as_str()));
        }
        if self.status != status {
            return Err(DccError::InvalidState(self.status));
        }
        Ok(())
    }

    /// Continue a partial download. The caller positions `writer` at
    /// `offset` before accepting.
    pub fn set_resume_offset(&mut self, offset: u64) -> Result<(), DccError> {
        self.require(DccDirection::Receive, DccStatus::Pending)?;
        self.resume_offset = offset.min(self.size);
        self.transferred = self.resume_offset;
        Ok(())
    }

    /// Accept a pending offer: connect to the sender and write into `writer`.
    pub fn accept(
        &mut self,
        writer: Box<dyn Write + Send>,
        network: &mut dyn DccNetwork,
    ) -> Result<(), DccError> {
        self.require(DccDirection::Receive, DccStatus::Pending)?;
        let target = SocketAddr::new(self.addr, self.port);
        match network.connect(target) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.writer = Some(writer);
                self.status = DccStatus::Connecting;
                debug!(%target, filename = %self.filename, "dcc receive connecting");
                Ok(())
            }
            Err(e) => {
                self.fail(format!("connect to {target} failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Decline a pending offer.
    pub fn reject(&mut self) -> Result<(), DccError> {
        if self.status != DccStatus::Pending {
            return Err(DccError::InvalidState(self.status));
        }
        self.status = DccStatus::Cancelled;
        Ok(())
    }

    /// Abort a transfer that has not finished.
    pub fn cancel(&mut self) -> Result<(), DccError> {
        if self.status.is_terminal() {
            return Err(DccError::InvalidState(self.status));
        }
        self.close();
        self.status = DccStatus::Cancelled;
        debug!(filename = %self.filename, "dcc transfer cancelled");
        Ok(())
    }

    /// Bytes moved since the last call, while transferring.
    pub fn take_progress(&mut self) -> Option<u64> {
        if self.status != DccStatus::Transferring || self.reported == Some(self.transferred) {
            return None;
        }
        self.reported = Some(self.transferred);
        Some(self.transferred)
    }

    /// Advance the transfer by one step.
    pub fn poll(&mut self) {
        let result = match (self.direction, self.status) {
            (DccDirection::Send, DccStatus::Connecting) => self.poll_accept(),
            (DccDirection::Send, DccStatus::Transferring) => self.poll_send(),
            (DccDirection::Receive, DccStatus::Connecting) => self.poll_connect(),
            (DccDirection::Receive, DccStatus::Transferring) => self.poll_receive(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.fail(e.to_string());
        }
    }

    fn poll_accept(&mut self) -> io::Result<()> {
        let Some(listener) = self.listener.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no listener"));
        };
        if let Some(stream) = listener.accept()? {
            self.stream = Some(stream);
            self.listener = None;
            self.status = DccStatus::Transferring;
            debug!(nick = %self.nick, filename = %self.filename, "dcc peer accepted");
        }
        Ok(())
    }

    fn poll_send(&mut self) -> io::Result<()> {
        let (Some(stream), Some(reader)) = (self.stream.as_mut(), self.reader.as_mut()) else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no stream"));
        };

        let unread = self.size - self.transferred - self.outbox.len() as u64;
        if self.outbox.is_empty() && unread > 0 {
            let want = CHUNK_SIZE.min(usize::try_from(unread).unwrap_or(CHUNK_SIZE));
            let mut chunk = vec![0u8; want];
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "file ended before the advertised size",
                ));
            }
            self.outbox.extend_from_slice(&chunk[..n]);
        }

        let written = flush_some(stream.as_mut(), &mut self.outbox)?;
        self.transferred += written as u64;

        // Acks carry no information we act on; keep the socket buffer empty.
        let mut acks = [0u8; 64];
        loop {
            match stream.read(&mut acks) {
                Ok(0) if self.transferred < self.size => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "peer closed the connection",
                    ));
                }
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        if self.transferred >= self.size {
            self.finish();
        }
        Ok(())
    }

    fn poll_connect(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no stream"));
        };
        if stream.poll_connected()? {
            self.status = DccStatus::Transferring;
            debug!(nick = %self.nick, filename = %self.filename, "dcc receive connected");
        }
        Ok(())
    }

    fn poll_receive(&mut self) -> io::Result<()> {
        let (Some(stream), Some(writer)) = (self.stream.as_mut(), self.writer.as_mut()) else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no stream"));
        };

        let remaining = self.size.saturating_sub(self.transferred);
        if remaining > 0 {
            let want = CHUNK_SIZE.min(usize::try_from(remaining).unwrap_or(CHUNK_SIZE));
            let mut chunk = vec![0u8; want];
            match stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed before the transfer completed",
                    ));
                }
                Ok(n) => {
                    writer.write_all(&chunk[..n])?;
                    self.transferred += n as u64;
                    // Acks are the cumulative count, truncated to 32 bits.
                    self.outbox
                        .extend_from_slice(&(self.transferred as u32).to_be_bytes());
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }
        flush_some(stream.as_mut(), &mut self.outbox)?;

        if self.transferred >= self.size {
            writer.flush()?;
            self.finish();
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.close();
        self.status = DccStatus::Completed;
        debug!(
            filename = %self.filename,
            bytes = self.transferred,
            direction = self.direction.as_str(),
            "dcc transfer completed"
        );
    }

    fn fail(&mut self, reason: String) {
        warn!(filename = %self.filename, nick = %self.nick, "dcc transfer failed: {}", reason);
        self.close();
        self.status = DccStatus::Failed;
        self.error = Some(reason);
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown();
        }
        self.listener = None;
        self.reader = None;
        self.writer = None;
        self.outbox.clear();
    }
}
