//! In-process transport
//!
//! Every [`MemoryTransport`] created from one [`MemoryNetwork`] shares a hub
//! that routes messages between them synchronously and in send order. Ports
//! can be marked as held by some other process and addresses can be made
//! unreachable, which makes bind conflicts and hanging joins reproducible
//! without touching real sockets.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use duckrun_core::ClientId;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::Message;
use crate::transport::{DisconnectReason, Transport, TransportEvent};

/// First port handed out when a host asks for port 0
const EPHEMERAL_BASE: u16 = 49152;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EndpointId(u64);

struct Listener {
    endpoint: EndpointId,
    next_client: u64,
    peers: BTreeMap<ClientId, EndpointId>,
}

#[derive(Default)]
struct Hub {
    next_endpoint: u64,
    inboxes: HashMap<EndpointId, VecDeque<TransportEvent>>,
    listeners: HashMap<u16, Listener>,
    occupied: HashSet<u16>,
    unreachable: HashSet<IpAddr>,
}

impl Hub {
    fn push(&mut self, endpoint: EndpointId, event: TransportEvent) {
        if let Some(inbox) = self.inboxes.get_mut(&endpoint) {
            inbox.push_back(event);
        }
    }

    fn port_taken(&self, port: u16) -> bool {
        self.occupied.contains(&port) || self.listeners.contains_key(&port)
    }

    fn ephemeral_port(&self) -> Option<u16> {
        (EPHEMERAL_BASE..=u16::MAX).find(|p| !self.port_taken(*p))
    }
}

/// Shared in-process network
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new endpoint attached to this network
    pub fn transport(&self) -> MemoryTransport {
        let mut hub = self.hub.lock();
        let endpoint = EndpointId(hub.next_endpoint);
        hub.next_endpoint += 1;
        hub.inboxes.insert(endpoint, VecDeque::new());
        MemoryTransport {
            hub: self.hub.clone(),
            endpoint,
            link: Link::Idle,
        }
    }

    /// Mark a port as held by something outside this network
    pub fn occupy(&self, port: u16) {
        self.hub.lock().occupied.insert(port);
    }

    pub fn release(&self, port: u16) {
        self.hub.lock().occupied.remove(&port);
    }

    /// Connections to `ip` will never complete
    pub fn set_unreachable(&self, ip: IpAddr) {
        self.hub.lock().unreachable.insert(ip);
    }

    pub fn is_listening(&self, port: u16) -> bool {
        self.hub.lock().listeners.contains_key(&port)
    }

    pub fn listener_count(&self) -> usize {
        self.hub.lock().listeners.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Idle,
    Listening { port: u16 },
    Connecting,
    Connected { port: u16, id: ClientId },
}

/// One endpoint on a [`MemoryNetwork`]
pub struct MemoryTransport {
    hub: Arc<Mutex<Hub>>,
    endpoint: EndpointId,
    link: Link,
}

impl MemoryTransport {
    pub fn local_id(&self) -> Option<ClientId> {
        match self.link {
            Link::Connected { id, .. } => Some(id),
            _ => None,
        }
    }
}

impl Transport for MemoryTransport {
    fn start_host(&mut self, bind: SocketAddr) -> Result<SocketAddr> {
        if self.link != Link::Idle {
            return Err(Error::AlreadyRunning);
        }
        let mut hub = self.hub.lock();
        let port = if bind.port() == 0 {
            hub.ephemeral_port().ok_or_else(|| {
                Error::Io(io::Error::new(io::ErrorKind::AddrInUse, "no free ports"))
            })?
        } else {
            bind.port()
        };
        if hub.port_taken(port) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("port {} already in use", port),
            )));
        }
        hub.listeners.insert(
            port,
            Listener {
                endpoint: self.endpoint,
                next_client: 1,
                peers: BTreeMap::new(),
            },
        );
        self.link = Link::Listening { port };
        debug!(port = port, "Memory listener bound");
        Ok(SocketAddr::new(bind.ip(), port))
    }

    fn start_client(&mut self, server: SocketAddr) -> Result<()> {
        if self.link != Link::Idle {
            return Err(Error::AlreadyRunning);
        }
        let mut hub = self.hub.lock();
        if hub.unreachable.contains(&server.ip()) {
            self.link = Link::Connecting;
            return Ok(());
        }

        let port = server.port();
        let endpoint = self.endpoint;
        if !hub.listeners.contains_key(&port) {
            hub.push(
                endpoint,
                TransportEvent::DisconnectedFromServer {
                    reason: DisconnectReason::ConnectionFailed("connection refused".into()),
                },
            );
            self.link = Link::Connecting;
            return Ok(());
        }

        let Some(listener) = hub.listeners.get_mut(&port) else {
            return Err(Error::ConnectionClosed);
        };
        let id = ClientId(listener.next_client);
        listener.next_client += 1;
        listener.peers.insert(id, endpoint);
        let server_endpoint = listener.endpoint;

        hub.push(server_endpoint, TransportEvent::PeerConnected(id));
        hub.push(endpoint, TransportEvent::ConnectedToServer { local_id: id });
        self.link = Link::Connected { port, id };
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.link != Link::Idle
    }

    fn shutdown(&mut self) {
        let mut hub = self.hub.lock();
        match self.link {
            Link::Idle => {}
            Link::Listening { port } => {
                if let Some(listener) = hub.listeners.remove(&port) {
                    for peer in listener.peers.values() {
                        hub.push(
                            *peer,
                            TransportEvent::DisconnectedFromServer {
                                reason: DisconnectReason::ServerShutdown,
                            },
                        );
                    }
                }
            }
            Link::Connecting => {}
            Link::Connected { port, id } => {
                let server = hub.listeners.get_mut(&port).and_then(|l| {
                    l.peers.remove(&id).map(|_| l.endpoint)
                });
                if let Some(server) = server {
                    hub.push(server, TransportEvent::PeerDisconnected(id));
                }
            }
        }
        if let Some(inbox) = hub.inboxes.get_mut(&self.endpoint) {
            inbox.clear();
        }
        self.link = Link::Idle;
    }

    fn send(&mut self, to: ClientId, message: Message) -> Result<()> {
        let Link::Listening { port } = self.link else {
            return Err(Error::NotActive);
        };
        let mut hub = self.hub.lock();
        let peer = hub
            .listeners
            .get(&port)
            .and_then(|l| l.peers.get(&to).copied())
            .ok_or(Error::UnknownClient(to))?;
        hub.push(peer, TransportEvent::FromServer(message));
        Ok(())
    }

    fn broadcast(&mut self, message: Message) -> Result<()> {
        let Link::Listening { port } = self.link else {
            return Err(Error::NotActive);
        };
        let mut hub = self.hub.lock();
        let peers: Vec<EndpointId> = hub
            .listeners
            .get(&port)
            .map(|l| l.peers.values().copied().collect())
            .unwrap_or_default();
        for peer in peers {
            hub.push(peer, TransportEvent::FromServer(message.clone()));
        }
        Ok(())
    }

    fn send_to_server(&mut self, message: Message) -> Result<()> {
        let Link::Connected { port, id } = self.link else {
            return Err(Error::NotActive);
        };
        let mut hub = self.hub.lock();
        let server = hub
            .listeners
            .get(&port)
            .filter(|l| l.peers.contains_key(&id))
            .map(|l| l.endpoint)
            .ok_or(Error::ConnectionClosed)?;
        hub.push(server, TransportEvent::FromClient { from: id, message });
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let event = self.hub.lock().inboxes.get_mut(&self.endpoint)?.pop_front()?;
        if matches!(event, TransportEvent::DisconnectedFromServer { .. }) {
            self.link = Link::Idle;
        }
        Some(event)
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.shutdown();
        self.hub.lock().inboxes.remove(&self.endpoint);
    }
}
