//! TCP transport driven by a tokio runtime
//!
//! The [`Transport`] calls are synchronous. Network work happens on tasks
//! spawned onto the runtime handle, and their results are drained from a
//! channel by [`Transport::poll_event`]. Every start opens a fresh channel,
//! so events from a previous run never leak into the next one.

use std::net::SocketAddr;

use duckrun_core::ClientId;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::client::ClientHandle;
use crate::error::{Error, Result};
use crate::protocol::Message;
use crate::server::ServerHandle;
use crate::transport::{Transport, TransportEvent};

/// Default limit on remote clients per server
pub const DEFAULT_MAX_CLIENTS: usize = 32;

enum Mode {
    Idle,
    Server(ServerHandle),
    Client(ClientHandle),
}

pub struct TcpTransport {
    runtime: Handle,
    max_clients: usize,
    mode: Mode,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl TcpTransport {
    pub fn new(runtime: Handle) -> Self {
        Self::with_max_clients(runtime, DEFAULT_MAX_CLIENTS)
    }

    pub fn with_max_clients(runtime: Handle, max_clients: usize) -> Self {
        Self {
            runtime,
            max_clients,
            mode: Mode::Idle,
            events: None,
        }
    }

    /// Address the server is listening on, if hosting
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.mode {
            Mode::Server(server) => Some(server.addr()),
            _ => None,
        }
    }
}

impl Transport for TcpTransport {
    fn start_host(&mut self, bind: SocketAddr) -> Result<SocketAddr> {
        if self.is_active() {
            return Err(Error::AlreadyRunning);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let server = ServerHandle::start(&self.runtime, bind, self.max_clients, tx)?;
        let addr = server.addr();
        self.events = Some(rx);
        self.mode = Mode::Server(server);
        Ok(addr)
    }

    fn start_client(&mut self, server: SocketAddr) -> Result<()> {
        if self.is_active() {
            return Err(Error::AlreadyRunning);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let client = ClientHandle::connect(&self.runtime, server, tx);
        self.events = Some(rx);
        self.mode = Mode::Client(client);
        Ok(())
    }

    fn is_active(&self) -> bool {
        !matches!(self.mode, Mode::Idle)
    }

    fn shutdown(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Idle => {}
            Mode::Server(server) => server.shutdown(),
            Mode::Client(client) => client.disconnect(),
        }
        self.events = None;
    }

    fn send(&mut self, to: ClientId, message: Message) -> Result<()> {
        match &self.mode {
            Mode::Server(server) => server.send(to, message),
            _ => Err(Error::NotActive),
        }
    }

    fn broadcast(&mut self, message: Message) -> Result<()> {
        match &self.mode {
            Mode::Server(server) => {
                server.broadcast(message);
                Ok(())
            }
            _ => Err(Error::NotActive),
        }
    }

    fn send_to_server(&mut self, message: Message) -> Result<()> {
        match &self.mode {
            Mode::Client(client) => client.send(message),
            _ => Err(Error::NotActive),
        }
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let event = self.events.as_mut()?.try_recv().ok()?;
        if let TransportEvent::DisconnectedFromServer { reason } = &event {
            debug!(reason = %reason, "Client connection ended");
            // The connection task has already exited
            self.mode = Mode::Idle;
        }
        Some(event)
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::DisconnectReason;

    async fn next_event(transport: &mut TcpTransport) -> TransportEvent {
        for _ in 0..200 {
            if let Some(event) = transport.poll_event() {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no transport event within 2s");
    }

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_handshake_and_messages() {
        let mut host = TcpTransport::new(Handle::current());
        let addr = host.start_host(loopback()).unwrap();

        let mut client = TcpTransport::new(Handle::current());
        client.start_client(addr).unwrap();

        let local_id = match next_event(&mut client).await {
            TransportEvent::ConnectedToServer { local_id } => local_id,
            other => panic!("unexpected event: {:?}", other),
        };
        assert_eq!(next_event(&mut host).await, TransportEvent::PeerConnected(local_id));

        client.send_to_server(Message::PlayerCount { count: 9 }).unwrap();
        assert_eq!(
            next_event(&mut host).await,
            TransportEvent::FromClient {
                from: local_id,
                message: Message::PlayerCount { count: 9 },
            }
        );

        host.send(local_id, Message::LoadScene { scene: "02_Lobby".into() }).unwrap();
        assert_eq!(
            next_event(&mut client).await,
            TransportEvent::FromServer(Message::LoadScene { scene: "02_Lobby".into() })
        );

        client.shutdown();
        assert_eq!(next_event(&mut host).await, TransportEvent::PeerDisconnected(local_id));
        host.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_shutdown_reaches_client() {
        let mut host = TcpTransport::new(Handle::current());
        let addr = host.start_host(loopback()).unwrap();

        let mut client = TcpTransport::new(Handle::current());
        client.start_client(addr).unwrap();
        assert!(matches!(
            next_event(&mut client).await,
            TransportEvent::ConnectedToServer { .. }
        ));
        assert!(matches!(next_event(&mut host).await, TransportEvent::PeerConnected(_)));

        host.shutdown();
        assert_eq!(
            next_event(&mut client).await,
            TransportEvent::DisconnectedFromServer {
                reason: DisconnectReason::ServerShutdown
            }
        );
        assert!(!client.is_active());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_refused_connection_reports_failure() {
        // Grab a free port, then release it so nothing is listening there
        let addr = std::net::TcpListener::bind(loopback())
            .unwrap()
            .local_addr()
            .unwrap();

        let mut client = TcpTransport::new(Handle::current());
        client.start_client(addr).unwrap();
        assert!(matches!(
            next_event(&mut client).await,
            TransportEvent::DisconnectedFromServer {
                reason: DisconnectReason::ConnectionFailed(_)
            }
        ));
        assert!(!client.is_active());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_full_server_rejects() {
        let mut host = TcpTransport::with_max_clients(Handle::current(), 0);
        let addr = host.start_host(loopback()).unwrap();

        let mut client = TcpTransport::new(Handle::current());
        client.start_client(addr).unwrap();
        assert_eq!(
            next_event(&mut client).await,
            TransportEvent::DisconnectedFromServer {
                reason: DisconnectReason::Rejected("Server full".into())
            }
        );
        host.shutdown();
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let mut host = TcpTransport::new(Handle::current());
        host.start_host(loopback()).unwrap();
        assert!(matches!(host.start_host(loopback()), Err(Error::AlreadyRunning)));
        host.shutdown();
        host.shutdown();
        assert!(!host.is_active());
    }
}
