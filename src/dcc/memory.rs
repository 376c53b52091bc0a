//! In-process DCC network for tests and simulations.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};

use super::net::{DccListener, DccNetwork, DccStream};

#[derive(Debug, Default)]
struct Pipe {
    /// Bytes travelling towards the transfer.
    inbound: VecDeque<u8>,
    /// Bytes the transfer wrote.
    outbound: VecDeque<u8>,
    peer_closed: bool,
    local_closed: bool,
}

type SharedPipe = Arc<Mutex<Pipe>>;

fn lock(pipe: &SharedPipe) -> MutexGuard<'_, Pipe> {
    pipe.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct NetState {
    next_port: u16,
    listeners: HashMap<u16, VecDeque<SharedPipe>>,
    outbound: Vec<(SocketAddr, SharedPipe)>,
    refuse: bool,
}

impl Default for NetState {
    fn default() -> Self {
        Self {
            next_port: 40_000,
            listeners: HashMap::new(),
            outbound: Vec::new(),
            refuse: false,
        }
    }
}

/// A [`DccNetwork`] whose sockets are in-memory pipes.
///
/// Clones share state: keep one clone in the test and hand the other to
/// the client.
#[derive(Clone, Debug, Default)]
pub struct MemoryDccNetwork {
    state: Arc<Mutex<NetState>>,
}

impl MemoryDccNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, NetState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every later `connect` fail with `ConnectionRefused`.
    pub fn refuse_connections(&mut self, refuse: bool) {
        self.state().refuse = refuse;
    }

    /// Connect to a listening transfer as the remote peer.
    pub fn dial(&self, port: u16) -> io::Result<MemoryDccPeer> {
        let mut state = self.state();
        let queue = state
            .listeners
            .get_mut(&port)
            .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionRefused))?;
        let pipe = SharedPipe::default();
        queue.push_back(pipe.clone());
        Ok(MemoryDccPeer { pipe })
    }

    /// The remote end of a connection a transfer opened to `addr`.
    pub fn take_outbound(&self, addr: SocketAddr) -> Option<MemoryDccPeer> {
        let mut state = self.state();
        let index = state.outbound.iter().position(|(a, _)| *a == addr)?;
        let (_, pipe) = state.outbound.remove(index);
        Some(MemoryDccPeer { pipe })
    }

    /// Addresses transfers have connected to, oldest first.
    pub fn outbound_addrs(&self) -> Vec<SocketAddr> {
        self.state().outbound.iter().map(|(a, _)| *a).collect()
    }
}

impl DccNetwork for MemoryDccNetwork {
    fn listen(&mut self, _local: IpAddr) -> io::Result<Box<dyn DccListener>> {
        let mut state = self.state();
        let port = state.next_port;
        state.next_port = state.next_port.wrapping_add(1).max(1024);
        state.listeners.insert(port, VecDeque::new());
        Ok(Box::new(MemoryListener {
            port,
            network: self.clone(),
        }))
    }

    fn connect(&mut self, addr: SocketAddr) -> io::Result<Box<dyn DccStream>> {
        let mut state = self.state();
        if state.refuse {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        let pipe = SharedPipe::default();
        state.outbound.push((addr, pipe.clone()));
        Ok(Box::new(MemoryStream { pipe }))
    }
}

struct MemoryListener {
    port: u16,
    network: MemoryDccNetwork,
}

impl DccListener for MemoryListener {
    fn local_port(&self) -> u16 {
        self.port
    }

    fn accept(&mut self) -> io::Result<Option<Box<dyn DccStream>>> {
        let mut state = self.network.state();
        let pipe = state
            .listeners
            .get_mut(&self.port)
            .and_then(VecDeque::pop_front);
        Ok(pipe.map(|pipe| Box::new(MemoryStream { pipe }) as Box<dyn DccStream>))
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.network.state().listeners.remove(&self.port);
    }
}

/// The transfer's end of a pipe.
struct MemoryStream {
    pipe: SharedPipe,
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = lock(&self.pipe);
        if pipe.inbound.is_empty() {
            return if pipe.peer_closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }
        let n = buf.len().min(pipe.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut pipe = lock(&self.pipe);
        if pipe.local_closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        pipe.outbound.extend(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DccStream for MemoryStream {
    fn poll_connected(&mut self) -> io::Result<bool> {
        Ok(true)
    }

    fn shutdown(&mut self) {
        lock(&self.pipe).local_closed = true;
    }
}

/// The remote side of an in-memory DCC connection.
#[derive(Clone, Debug)]
pub struct MemoryDccPeer {
    pipe: SharedPipe,
}

impl MemoryDccPeer {
    /// Send bytes to the transfer.
    pub fn write(&self, bytes: &[u8]) {
        lock(&self.pipe).inbound.extend(bytes);
    }

    /// Everything the transfer has written so far.
    pub fn read_all(&self) -> Vec<u8> {
        lock(&self.pipe).outbound.drain(..).collect()
    }

    /// Stop sending; the transfer reads EOF once the buffer drains.
    pub fn close(&self) {
        lock(&self.pipe).peer_closed = true;
    }

    /// True once the transfer shut its end down.
    pub fn is_closed_by_transfer(&self) -> bool {
        lock(&self.pipe).local_closed
    }
}
