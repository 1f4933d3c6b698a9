//! Network error types

use std::fmt;
use std::io;

use duckrun_core::ClientId;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection rejected: {0}")]
    Rejected(String),

    #[error("Transport not active")]
    NotActive,

    #[error("Transport already running")]
    AlreadyRunning,

    #[error("Unknown client {0}")]
    UnknownClient(ClientId),
}

/// Outcome of a session operation.
///
/// Session operations never return `Err` or panic across their public
/// boundary; every failure is one of these discrete codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetStartResult {
    Success,
    /// The session has no transport wired in
    NotInitialized,
    /// Malformed caller-supplied address or port
    InvalidInput,
    /// An optional backing service (the online relay) is absent
    ServicesUnavailable,
    /// Bind or start failure at the network layer
    TransportError,
    UnknownError,
}

impl NetStartResult {
    pub fn is_success(self) -> bool {
        self == NetStartResult::Success
    }
}

impl fmt::Display for NetStartResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetStartResult::Success => "Success",
            NetStartResult::NotInitialized => "NotInitialized",
            NetStartResult::InvalidInput => "InvalidInput",
            NetStartResult::ServicesUnavailable => "ServicesUnavailable",
            NetStartResult::TransportError => "TransportError",
            NetStartResult::UnknownError => "UnknownError",
        };
        f.write_str(s)
    }
}

impl From<&Error> for NetStartResult {
    fn from(err: &Error) -> Self {
        match err {
            Error::Io(_) | Error::ConnectionClosed | Error::AlreadyRunning | Error::NotActive => {
                NetStartResult::TransportError
            }
            Error::Rejected(_) | Error::Protocol(_) => NetStartResult::TransportError,
            Error::UnknownClient(_) => NetStartResult::UnknownError,
        }
    }
}
