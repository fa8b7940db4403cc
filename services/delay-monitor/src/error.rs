//! Service-specific error types

use std::net::SocketAddr;

use thiserror::Error;

/// Delay monitor lifecycle errors.
///
/// Per-cycle fetch failures never reach this type; the poller hands them to
/// the sink and keeps going.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to bind chart listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("polling loop stopped: {0}")]
    PollerStopped(String),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
