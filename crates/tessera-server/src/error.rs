//! Server errors.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while starting or running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `server.http_addr` is not a socket address.
    #[error("invalid listen address `{addr}`: {source}")]
    InvalidAddress {
        /// The configured value.
        addr: String,
        /// Parse failure.
        source: std::net::AddrParseError,
    },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was tried.
        addr: SocketAddr,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Other I/O failure on the listener.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
