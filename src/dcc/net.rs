//! Sockets used by DCC transfers.
//!
//! Transfers only see the [`DccNetwork`], [`DccListener`] and
//! [`DccStream`] traits. [`StdDccNetwork`] implements them with
//! non-blocking std/socket2 sockets; tests use
//! [`MemoryDccNetwork`](super::MemoryDccNetwork).

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, TcpKeepalive, Type};
use tracing::{debug, warn};

/// A byte stream to a DCC peer. Reads and writes never block; they fail
/// with [`io::ErrorKind::WouldBlock`] instead.
pub trait DccStream: Read + Write + Send {
    /// True once an outgoing connect has completed.
    fn poll_connected(&mut self) -> io::Result<bool>;

    /// Close both directions.
    fn shutdown(&mut self);
}

/// A listening socket waiting for the peer of an outgoing offer.
pub trait DccListener: Send {
    fn local_port(&self) -> u16;

    /// Accept a pending connection, if one has arrived.
    fn accept(&mut self) -> io::Result<Option<Box<dyn DccStream>>>;
}

/// Factory for DCC sockets.
pub trait DccNetwork: Send {
    /// Listen on an ephemeral port of the same family as `local`.
    fn listen(&mut self, local: IpAddr) -> io::Result<Box<dyn DccListener>>;

    /// Start a non-blocking connect.
    fn connect(&mut self, addr: SocketAddr) -> io::Result<Box<dyn DccStream>>;
}

/// Real sockets.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDccNetwork;

impl StdDccNetwork {
    pub fn new() -> Self {
        Self
    }
}

/// Enable TCP keepalive on a DCC socket.
fn enable_keepalive(sock: SockRef<'_>) {
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));
    if let Err(e) = sock.set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keepalive on DCC socket: {}", e);
    }
}

#[cfg(unix)]
const EINPROGRESS: i32 = if cfg!(any(target_os = "macos", target_os = "ios", target_os = "freebsd")) {
    36
} else {
    115
};
#[cfg(windows)]
const EINPROGRESS: i32 = 10035;
#[cfg(not(any(unix, windows)))]
const EINPROGRESS: i32 = -1;

fn connect_pending(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == Some(EINPROGRESS)
}

impl DccNetwork for StdDccNetwork {
    fn listen(&mut self, local: IpAddr) -> io::Result<Box<dyn DccListener>> {
        let any: IpAddr = match local {
            IpAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            IpAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        let listener = TcpListener::bind(SocketAddr::new(any, 0))?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();
        debug!(port, "dcc listening");
        Ok(Box::new(StdDccListener { listener, port }))
    }

    fn connect(&mut self, addr: SocketAddr) -> io::Result<Box<dyn DccStream>> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;
        enable_keepalive(SockRef::from(&socket));

        match socket.connect(&SockAddr::from(addr)) {
            Ok(()) => {}
            Err(e) if connect_pending(&e) => {}
            Err(e) => return Err(e),
        }
        debug!(%addr, "dcc connecting");
        Ok(Box::new(StdDccStream { socket }))
    }
}

struct StdDccListener {
    listener: TcpListener,
    port: u16,
}

impl DccListener for StdDccListener {
    fn local_port(&self) -> u16 {
        self.port
    }

    fn accept(&mut self) -> io::Result<Option<Box<dyn DccStream>>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "dcc peer connected");
                stream.set_nonblocking(true)?;
                enable_keepalive(SockRef::from(&stream));
                Ok(Some(Box::new(StdDccStream {
                    socket: Socket::from(stream),
                })))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

struct StdDccStream {
    socket: Socket,
}

impl Read for StdDccStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.read(buf)
    }
}

impl Write for StdDccStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.socket.flush()
    }
}

impl DccStream for StdDccStream {
    fn poll_connected(&mut self) -> io::Result<bool> {
        if let Some(e) = self.socket.take_error()? {
            return Err(e);
        }
        match self.socket.peer_addr() {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn shutdown(&mut self) {
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_loopback_connect_and_accept() {
        let mut network = StdDccNetwork::new();
        let mut listener = network.listen(Ipv4Addr::LOCALHOST.into()).unwrap();
        let port = listener.local_port();
        assert_ne!(port, 0);

        let mut client = network
            .connect(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port))
            .unwrap();

        let mut accepted = None;
        for _ in 0..200 {
            if let Some(stream) = listener.accept().unwrap() {
                accepted = Some(stream);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let mut server = accepted.expect("peer never connected");

        let mut connected = false;
        for _ in 0..200 {
            if client.poll_connected().unwrap() {
                connected = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(connected);

        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        let mut read = 0;
        for _ in 0..200 {
            match server.read(&mut buf[read..]) {
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => panic!("read failed: {e}"),
            }
            if read == 4 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(&buf, b"ping");
    }
}
