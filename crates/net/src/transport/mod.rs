//! Transport binder abstraction
//!
//! A transport moves [`Message`]s between one server and its clients. It knows
//! nothing about roles, scenes or inventories; the session layers those on
//! top. Sending to one client and broadcasting to all are separate calls.

use std::fmt;
use std::net::SocketAddr;

use duckrun_core::ClientId;

use crate::error::Result;
use crate::protocol::Message;

pub mod memory;
pub mod tcp;

pub use memory::{MemoryNetwork, MemoryTransport};
pub use tcp::TcpTransport;

/// Why the local client lost (or never got) its server connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// No connection within the join timeout
    Timeout,
    /// The connection attempt failed outright
    ConnectionFailed(String),
    /// The server refused the handshake
    Rejected(String),
    /// The server announced it is shutting down
    ServerShutdown,
    /// No traffic from the server for too long
    HostUnresponsive,
    /// The connection dropped after it was established
    ConnectionLost(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Timeout => write!(
                f,
                "Join failed (timeout). Check IP/port and that host is running."
            ),
            DisconnectReason::ConnectionFailed(e) => write!(f, "Connection failed: {}", e),
            DisconnectReason::Rejected(reason) => write!(f, "Rejected by host: {}", reason),
            DisconnectReason::ServerShutdown => write!(f, "Host closed the session"),
            DisconnectReason::HostUnresponsive => write!(f, "Host stopped responding"),
            DisconnectReason::ConnectionLost(e) => write!(f, "Connection lost: {}", e),
        }
    }
}

/// Something that happened on the transport since the last poll
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Server side: a remote client completed its handshake
    PeerConnected(ClientId),
    /// Server side: a remote client went away
    PeerDisconnected(ClientId),
    /// Client side: the server accepted us
    ConnectedToServer { local_id: ClientId },
    /// Client side: the connection failed or dropped
    DisconnectedFromServer { reason: DisconnectReason },
    /// Server side: a message from a remote client
    FromClient { from: ClientId, message: Message },
    /// Client side: a message from the server
    FromServer(Message),
}

/// The network layer underneath a session
pub trait Transport: Send {
    /// Bind and start listening. Returns the address actually bound, which
    /// differs from `bind` when port 0 was requested.
    fn start_host(&mut self, bind: SocketAddr) -> Result<SocketAddr>;

    /// Begin connecting to a server. Completion or failure arrives later as
    /// [`TransportEvent::ConnectedToServer`] or
    /// [`TransportEvent::DisconnectedFromServer`].
    fn start_client(&mut self, server: SocketAddr) -> Result<()>;

    fn is_active(&self) -> bool;

    /// Stop listening or disconnect. Safe to call when already stopped.
    fn shutdown(&mut self);

    /// Server side: deliver to exactly one remote client
    fn send(&mut self, to: ClientId, message: Message) -> Result<()>;

    /// Server side: deliver to every remote client
    fn broadcast(&mut self, message: Message) -> Result<()>;

    /// Client side: deliver to the server
    fn send_to_server(&mut self, message: Message) -> Result<()>;

    fn poll_event(&mut self) -> Option<TransportEvent>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn start_host(&mut self, bind: SocketAddr) -> Result<SocketAddr> {
        (**self).start_host(bind)
    }

    fn start_client(&mut self, server: SocketAddr) -> Result<()> {
        (**self).start_client(server)
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }

    fn send(&mut self, to: ClientId, message: Message) -> Result<()> {
        (**self).send(to, message)
    }

    fn broadcast(&mut self, message: Message) -> Result<()> {
        (**self).broadcast(message)
    }

    fn send_to_server(&mut self, message: Message) -> Result<()> {
        (**self).send_to_server(message)
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        (**self).poll_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_reason_is_human_readable() {
        let text = DisconnectReason::Timeout.to_string();
        assert!(text.contains("timeout"));
    }
}
