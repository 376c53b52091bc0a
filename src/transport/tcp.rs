//! TCP/TLS transport on a tokio runtime.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, warn};

use super::{Transport, TransportStatus};
use crate::error::TransportError;

/// Channels of one open link.
struct Link {
    status: watch::Receiver<TransportStatus>,
    inbound: mpsc::UnboundedReceiver<BytesMut>,
    outbound: mpsc::UnboundedSender<Bytes>,
    task: JoinHandle<()>,
}

/// A [`Transport`] running a TCP or TLS connection as a tokio task.
///
/// The engine stays synchronous: `connect` spawns the task and returns,
/// `send` hands bytes to the writer and `receive` drains what the reader
/// has collected.
pub struct TokioTransport {
    handle: Handle,
    link: Option<Link>,
    local_addr: Arc<Mutex<Option<IpAddr>>>,
}

impl TokioTransport {
    /// Use the runtime of the calling context.
    pub fn new() -> Result<Self, TransportError> {
        let handle = Handle::try_current()
            .map_err(|e| TransportError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        Ok(Self::with_handle(handle))
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            link: None,
            local_addr: Arc::new(Mutex::new(None)),
        }
    }
}

impl std::fmt::Debug for TokioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioTransport")
            .field("open", &self.link.is_some())
            .finish_non_exhaustive()
    }
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));
    sock.set_tcp_keepalive(&keepalive)
}

fn tls_connector() -> TlsConnector {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!("Failed to add root cert: {}", e);
        }
    }
    for e in &certs.errors {
        warn!("Error loading native certs: {}", e);
    }
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

async fn open(
    host: String,
    port: u16,
    tls: bool,
    local_addr: Arc<Mutex<Option<IpAddr>>>,
    status: watch::Sender<TransportStatus>,
    inbound: mpsc::UnboundedSender<BytesMut>,
    outbound: mpsc::UnboundedReceiver<Bytes>,
) -> anyhow::Result<()> {
    let tcp = TcpStream::connect((host.as_str(), port))
        .await
        .with_context(|| format!("failed to connect to {host}:{port}"))?;
    if let Err(e) = enable_keepalive(&tcp) {
        warn!("failed to enable TCP keepalive: {}", e);
    }
    if let Ok(addr) = tcp.local_addr() {
        if let Ok(mut slot) = local_addr.lock() {
            *slot = Some(addr.ip());
        }
    }

    if tls {
        let server_name = ServerName::try_from(host.clone())
            .with_context(|| format!("invalid tls server name {host}"))?;
        let stream = tls_connector()
            .connect(server_name, tcp)
            .await
            .with_context(|| format!("tls handshake with {host} failed"))?;
        debug!(%host, port, "tls established");
        let _ = status.send(TransportStatus::Connected);
        pump(stream, &status, inbound, outbound).await
    } else {
        debug!(%host, port, "tcp established");
        let _ = status.send(TransportStatus::Connected);
        pump(tcp, &status, inbound, outbound).await
    }
}

/// Shuttle bytes until either side goes away.
async fn pump<S>(
    stream: S,
    status: &watch::Sender<TransportStatus>,
    inbound: mpsc::UnboundedSender<BytesMut>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = FramedRead::new(read_half, BytesCodec::new());

    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(bytes)) => {
                    if inbound.send(bytes).is_err() {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(e).context("read failed"),
                None => {
                    let _ = status.send(TransportStatus::Error("connection closed by peer".into()));
                    return Ok(());
                }
            },
            data = outbound.recv() => match data {
                Some(data) => write_half.write_all(&data).await.context("write failed")?,
                None => return Ok(()),
            },
        }
    }
}

impl Transport for TokioTransport {
    fn connect(&mut self, host: &str, port: u16, tls: bool) -> Result<(), TransportError> {
        self.close();

        let (status_tx, status_rx) = watch::channel(TransportStatus::Connecting);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let local_addr = self.local_addr.clone();
        let host = host.to_owned();

        let task = self.handle.spawn(async move {
            if let Err(e) = open(
                host,
                port,
                tls,
                local_addr,
                status_tx.clone(),
                inbound_tx,
                outbound_rx,
            )
            .await
            {
                warn!("transport error: {:#}", e);
                let _ = status_tx.send(TransportStatus::Error(format!("{e:#}")));
            }
        });

        self.link = Some(Link {
            status: status_rx,
            inbound: inbound_rx,
            outbound: outbound_tx,
            task,
        });
        Ok(())
    }

    fn poll(&mut self) -> TransportStatus {
        match &self.link {
            Some(link) => link.status.borrow().clone(),
            None => TransportStatus::Idle,
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::NotConnected)?;
        link.outbound
            .send(Bytes::copy_from_slice(data))
            .map_err(|_| TransportError::Closed)?;
        Ok(data.len())
    }

    fn receive(&mut self, buf: &mut BytesMut) -> Result<usize, TransportError> {
        let Some(link) = self.link.as_mut() else {
            return Ok(0);
        };
        let mut total = 0;
        while let Ok(bytes) = link.inbound.try_recv() {
            total += bytes.len();
            buf.extend_from_slice(&bytes);
        }
        Ok(total)
    }

    fn close(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
            debug!("transport closed");
        }
        if let Ok(mut slot) = self.local_addr.lock() {
            *slot = None;
        }
    }

    fn supports_tls(&self) -> bool {
        true
    }

    fn local_addr(&self) -> Option<IpAddr> {
        self.local_addr.lock().ok().and_then(|slot| *slot)
    }
}

impl Drop for TokioTransport {
    fn drop(&mut self) {
        self.close();
    }
}
