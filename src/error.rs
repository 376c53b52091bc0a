//! Error types for the IRC client engine.
//!
//! Protocol-level problems (malformed lines, unknown CAP subcommands,
//! SASL failures) are never surfaced here; they are logged and reported
//! as [`Event`](crate::Event)s. The types in this module cover operations
//! the host invokes directly: connecting, sending files, accepting offers.

use thiserror::Error;

use crate::dcc::DccStatus;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// I/O error outside of the transport (file access, local sockets).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport collaborator failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A DCC operation failed.
    #[error("dcc error: {0}")]
    Dcc(#[from] DccError),

    /// No DCC transfer exists at the given index.
    #[error("no dcc transfer at index {0}")]
    NoSuchTransfer(usize),
}

/// Errors raised by a [`Transport`](crate::transport::Transport) implementation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Hostname could not be resolved.
    #[error("failed to resolve {0}")]
    Resolve(String),

    /// TCP connection could not be established.
    #[error("failed to connect to {host}:{port}")]
    Connect {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// The underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// TLS was requested but this transport cannot provide it.
    #[error("tls is not available on this transport")]
    TlsUnavailable,

    /// The TLS handshake failed.
    #[error("tls handshake failed: {0}")]
    Tls(String),

    /// An operation was attempted without an open link.
    #[error("transport is not connected")]
    NotConnected,

    /// The peer closed the link.
    #[error("connection closed by peer")]
    Closed,

    /// I/O error on an open link.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the DCC transfer engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DccError {
    /// File or socket I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A `DCC SEND` offer could not be parsed.
    #[error("malformed dcc offer: {0}")]
    InvalidOffer(String),

    /// No local address is configured or discoverable for outgoing offers.
    #[error("no local address available for dcc")]
    NoLocalAddress,

    /// The transfer is not in a state that allows the operation.
    #[error("transfer is {0}, operation not allowed")]
    InvalidState(DccStatus),

    /// The operation only applies to the other transfer direction.
    #[error("operation not valid for a {0} transfer")]
    WrongDirection(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::NoSuchTransfer(3);
        assert_eq!(err.to_string(), "no dcc transfer at index 3");

        let err = DccError::InvalidState(DccStatus::Completed);
        assert_eq!(err.to_string(), "transfer is completed, operation not allowed");
    }

    #[test]
    fn test_transport_error_source_chaining() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = TransportError::Connect {
            host: "irc.example.com".to_string(),
            port: 6697,
            source: io_err,
        };

        assert_eq!(err.to_string(), "failed to connect to irc.example.com:6697");
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
        assert_eq!(source.unwrap().to_string(), "refused");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let dcc_err: DccError = io_err.into();
        let client_err: ClientError = dcc_err.into();

        match client_err {
            ClientError::Dcc(DccError::Io(_)) => {}
            other => panic!("Expected Dcc(Io), got {other:?}"),
        }

        let client_err: ClientError = TransportError::TlsUnavailable.into();
        assert!(matches!(
            client_err,
            ClientError::Transport(TransportError::TlsUnavailable)
        ));
    }
}
