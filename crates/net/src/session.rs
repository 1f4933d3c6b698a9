//! Networked session state machine
//!
//! A [`Session`] wraps one [`Transport`] and tracks which role the local
//! process plays (host, dedicated server, client or nothing), whether the
//! local participant is connected, who else is connected and which scene
//! the host has put everyone in.
//!
//! Public operations never fail with `Err` or panic. Each returns a
//! [`NetStartResult`] code, and everything that happens later (connects,
//! disconnects, scene changes, gameplay traffic) is queued as a
//! [`SessionEvent`] for the caller to drain with [`Session::poll_event`].
//!
//! The session is driven by [`Session::update`], which pumps transport events
//! and fires due timers. The only timer today is the join timeout.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::time::Instant;

use duckrun_core::{ClientId, ClientRequest, Scheduler, ServerUpdate, TimerId, WorldEvent};
use tracing::{debug, info, warn};

use crate::autoport;
use crate::config::NetConfig;
use crate::error::NetStartResult;
use crate::protocol::Message;
use crate::transport::{DisconnectReason, Transport, TransportEvent};

/// Boxed future returned by the relay operations
pub type RelayFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which part the local process plays in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    None,
    /// Server plus a local client
    Host,
    Client,
    /// Dedicated server with no local client
    Server,
}

impl Role {
    pub fn is_host(self) -> bool {
        self == Role::Host
    }

    pub fn is_server(self) -> bool {
        matches!(self, Role::Host | Role::Server)
    }

    pub fn is_client(self) -> bool {
        matches!(self, Role::Host | Role::Client)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::None => "none",
            Role::Host => "host",
            Role::Client => "client",
            Role::Server => "server",
        };
        f.write_str(s)
    }
}

/// Something the owner of a session should react to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The local participant is connected. Fires immediately when hosting.
    Connected,
    /// The local client's connection failed or dropped
    Disconnected { reason: DisconnectReason },
    /// Server side: a participant joined (the host's own client included)
    ClientJoined(ClientId),
    /// Server side: a participant left
    ClientLeft(ClientId),
    /// The host moved everyone to another scene
    SceneChange { scene: String },
    /// Server side: a gameplay request from a participant
    Request { from: ClientId, request: ClientRequest },
    /// Client side: a gameplay update addressed to the local participant
    Update(ServerUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionTimer {
    JoinTimeout,
}

/// Session operations the menu and lobby drive
pub trait NetSession {
    fn is_host(&self) -> bool;
    fn is_server(&self) -> bool;
    fn is_client(&self) -> bool;
    fn is_connected(&self) -> bool;
    fn player_count(&self) -> usize;
    fn last_bound(&self) -> Option<SocketAddr>;

    /// Host through the online relay. Resolves to a result and a join code.
    fn host_online(&mut self, max_players: usize) -> RelayFuture<'_, (NetStartResult, String)>;
    /// Join through the online relay
    fn join_online(&mut self, join_code: &str) -> RelayFuture<'_, NetStartResult>;

    fn host_lan_auto_port(&mut self) -> (NetStartResult, Option<u16>);
    fn host_lan(&mut self, port: u16) -> NetStartResult;
    fn join_lan(&mut self, address: &str, port: u16) -> NetStartResult;
    fn load_scene_for_all(&mut self, scene: &str);
    fn shutdown(&mut self);
}

/// Message primitives the gameplay layer uses to talk across the session
///
/// `send_to_client` reaches exactly one participant. `broadcast` reaches all
/// of them and only carries public world events.
pub trait RpcChannel {
    /// Id of the local participant, if it is connected as a client
    fn local_client(&self) -> Option<ClientId>;
    fn send_to_server(&mut self, request: ClientRequest);
    fn send_to_client(&mut self, to: ClientId, update: ServerUpdate);
    fn broadcast(&mut self, event: WorldEvent);
}

/// A networked session over transport `T`
pub struct Session<T: Transport> {
    transport: Option<T>,
    config: NetConfig,
    role: Role,
    connected: bool,
    local_id: Option<ClientId>,
    participants: BTreeSet<ClientId>,
    player_count: usize,
    active_scene: Option<String>,
    last_bound: Option<SocketAddr>,
    timers: Scheduler<SessionTimer>,
    join_timer: Option<TimerId>,
    events: VecDeque<SessionEvent>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: NetConfig) -> Self {
        Self::build(Some(transport), config)
    }

    /// A session with no transport wired in. Every start reports
    /// `NotInitialized`.
    pub fn detached(config: NetConfig) -> Self {
        Self::build(None, config)
    }

    fn build(transport: Option<T>, config: NetConfig) -> Self {
        Self {
            transport,
            config,
            role: Role::None,
            connected: false,
            local_id: None,
            participants: BTreeSet::new(),
            player_count: 0,
            active_scene: None,
            last_bound: None,
            timers: Scheduler::new(),
            join_timer: None,
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }

    pub fn is_server(&self) -> bool {
        self.role.is_server()
    }

    pub fn is_client(&self) -> bool {
        self.role.is_client()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The local participant's id once connected
    pub fn local_id(&self) -> Option<ClientId> {
        self.local_id
    }

    /// Connected participants, host included. On clients this is the last
    /// count the host announced.
    pub fn player_count(&self) -> usize {
        self.player_count
    }

    /// Server side: ids of every connected participant
    pub fn participants(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.participants.iter().copied()
    }

    pub fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }

    /// Address of the last successful bind. Survives shutdown.
    pub fn last_bound(&self) -> Option<SocketAddr> {
        self.last_bound
    }

    pub fn bound_port(&self) -> Option<u16> {
        self.last_bound.map(|addr| addr.port())
    }

    /// Whether a join is waiting for its connection
    pub fn is_joining(&self) -> bool {
        self.join_timer.is_some()
    }

    /// Host on the configured base port, moving up through the configured
    /// number of fallback ports until one binds
    pub fn host_lan_auto_port(&mut self) -> (NetStartResult, Option<u16>) {
        let base = self.config.base_port;
        let max_attempts = self.config.max_port_attempts;
        autoport::host_with_retry(self, base, max_attempts)
    }

    /// Host (server plus local client) on one port
    pub fn host_lan(&mut self, port: u16) -> NetStartResult {
        self.start_listening(Role::Host, port)
    }

    /// Dedicated server on one port
    pub fn serve_lan(&mut self, port: u16) -> NetStartResult {
        self.start_listening(Role::Server, port)
    }

    fn start_listening(&mut self, role: Role, port: u16) -> NetStartResult {
        let bind = SocketAddr::new(self.config.bind_address, port);
        let Some(transport) = self.transport.as_mut() else {
            warn!("No transport wired into session");
            return NetStartResult::NotInitialized;
        };

        let addr = match transport.start_host(bind) {
            Ok(addr) => addr,
            Err(e) => {
                warn!(port = port, role = %role, error = %e, "Failed to start listening");
                return NetStartResult::from(&e);
            }
        };

        self.role = role;
        self.last_bound = Some(addr);
        info!(addr = %addr, role = %role, "Session listening");

        if role.is_host() {
            self.connected = true;
            self.local_id = Some(ClientId::HOST);
            self.participants.insert(ClientId::HOST);
            self.events.push_back(SessionEvent::Connected);
            self.events.push_back(SessionEvent::ClientJoined(ClientId::HOST));
        }
        self.refresh_player_count();
        NetStartResult::Success
    }

    /// Join a LAN host. The result only says whether connecting began; the
    /// outcome arrives as `Connected` or `Disconnected`.
    pub fn join_lan(&mut self, address: &str, port: u16) -> NetStartResult {
        let address = address.trim();
        if address.is_empty() {
            return NetStartResult::InvalidInput;
        }
        let server = match (address, port).to_socket_addrs() {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => addr,
                None => return NetStartResult::InvalidInput,
            },
            Err(e) => {
                debug!(address = address, error = %e, "Could not resolve join address");
                return NetStartResult::InvalidInput;
            }
        };

        let Some(transport) = self.transport.as_mut() else {
            warn!("No transport wired into session");
            return NetStartResult::NotInitialized;
        };
        if let Err(e) = transport.start_client(server) {
            warn!(addr = %server, error = %e, "Failed to start client");
            return NetStartResult::from(&e);
        }

        self.role = Role::Client;
        self.connected = false;
        self.cancel_join_timer();
        let id = self.timers.schedule_after(
            Instant::now(),
            self.config.join_timeout(),
            SessionTimer::JoinTimeout,
        );
        self.join_timer = Some(id);
        info!(addr = %server, "Joining session");
        NetStartResult::Success
    }

    /// Relay hosting is not wired up; always `ServicesUnavailable`
    pub fn host_online(&mut self, max_players: usize) -> RelayFuture<'_, (NetStartResult, String)> {
        debug!(max_players = max_players, "Online hosting requested without relay");
        Box::pin(std::future::ready((
            NetStartResult::ServicesUnavailable,
            String::new(),
        )))
    }

    /// Relay joining is not wired up; always `ServicesUnavailable`
    pub fn join_online(&mut self, join_code: &str) -> RelayFuture<'_, NetStartResult> {
        debug!(join_code = join_code, "Online join requested without relay");
        Box::pin(std::future::ready(NetStartResult::ServicesUnavailable))
    }

    /// Move every participant to `scene`. Ignored unless hosting.
    pub fn load_scene_for_all(&mut self, scene: &str) {
        if !self.is_host() {
            debug!(scene = scene, "Ignoring scene change: not host");
            return;
        }
        info!(scene = scene, "Loading scene for all participants");
        self.active_scene = Some(scene.to_string());
        if let Some(transport) = self.transport.as_mut() {
            let msg = Message::LoadScene {
                scene: scene.to_string(),
            };
            if let Err(e) = transport.broadcast(msg) {
                warn!(error = %e, "Failed to broadcast scene change");
            }
        }
        self.events.push_back(SessionEvent::SceneChange {
            scene: scene.to_string(),
        });
    }

    /// Tear everything down. Safe to call any number of times.
    pub fn shutdown(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            if transport.is_active() {
                transport.shutdown();
                info!(role = %self.role, "Session shut down");
            }
        }
        self.timers.cancel_all();
        self.join_timer = None;
        // Nothing queued for the old session may reach the caller
        self.events.clear();
        self.role = Role::None;
        self.connected = false;
        self.local_id = None;
        self.participants.clear();
        self.player_count = 0;
        self.active_scene = None;
    }

    /// Pump transport events and fire due timers
    pub fn update(&mut self, now: Instant) {
        while let Some(event) = self.transport.as_mut().and_then(|t| t.poll_event()) {
            self.handle_transport_event(event);
        }
        for timer in self.timers.poll(now) {
            self.fire_timer(timer);
        }
    }

    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerConnected(id) => {
                if !self.is_server() {
                    return;
                }
                self.participants.insert(id);
                info!(client = %id, "Client joined");
                if let Some(scene) = self.active_scene.clone() {
                    self.send_message(id, Message::LoadScene { scene });
                }
                self.events.push_back(SessionEvent::ClientJoined(id));
                self.refresh_player_count();
            }
            TransportEvent::PeerDisconnected(id) => {
                if !self.participants.remove(&id) {
                    return;
                }
                info!(client = %id, "Client left");
                self.events.push_back(SessionEvent::ClientLeft(id));
                self.refresh_player_count();
            }
            TransportEvent::ConnectedToServer { local_id } => {
                if self.role != Role::Client {
                    return;
                }
                self.cancel_join_timer();
                self.connected = true;
                self.local_id = Some(local_id);
                info!(client = %local_id, "Connected to host");
                self.events.push_back(SessionEvent::Connected);
            }
            TransportEvent::DisconnectedFromServer { reason } => {
                if self.role != Role::Client {
                    return;
                }
                info!(reason = %reason, "Disconnected from host");
                self.shutdown();
                self.events.push_back(SessionEvent::Disconnected { reason });
            }
            TransportEvent::FromClient { from, message } => match message {
                Message::Request(request) => {
                    self.events.push_back(SessionEvent::Request { from, request });
                }
                other => debug!(client = %from, message = ?other, "Ignoring client message"),
            },
            TransportEvent::FromServer(message) => self.handle_server_message(message),
        }
    }

    fn handle_server_message(&mut self, message: Message) {
        match message {
            Message::LoadScene { scene } => {
                info!(scene = %scene, "Host changed scene");
                self.active_scene = Some(scene.clone());
                self.events.push_back(SessionEvent::SceneChange { scene });
            }
            Message::PlayerCount { count } => {
                self.player_count = count;
            }
            Message::Update(update) => {
                self.events.push_back(SessionEvent::Update(update));
            }
            other => debug!(message = ?other, "Ignoring server message"),
        }
    }

    fn fire_timer(&mut self, timer: SessionTimer) {
        match timer {
            SessionTimer::JoinTimeout => {
                self.join_timer = None;
                if self.connected || self.role != Role::Client {
                    return;
                }
                warn!("Join timed out");
                self.shutdown();
                self.events.push_back(SessionEvent::Disconnected {
                    reason: DisconnectReason::Timeout,
                });
            }
        }
    }

    fn cancel_join_timer(&mut self) {
        if let Some(id) = self.join_timer.take() {
            self.timers.cancel(id);
        }
    }

    fn refresh_player_count(&mut self) {
        if !self.is_server() {
            return;
        }
        self.player_count = self.participants.len();
        let count = self.player_count;
        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.broadcast(Message::PlayerCount { count }) {
                debug!(error = %e, "Failed to broadcast player count");
            }
        }
    }

    fn send_message(&mut self, to: ClientId, message: Message) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.send(to, message) {
            debug!(client = %to, error = %e, "Failed to send message");
        }
    }
}

impl<T: Transport> RpcChannel for Session<T> {
    fn local_client(&self) -> Option<ClientId> {
        if self.connected {
            self.local_id
        } else {
            None
        }
    }

    fn send_to_server(&mut self, request: ClientRequest) {
        match self.role {
            Role::Host => {
                self.events.push_back(SessionEvent::Request {
                    from: ClientId::HOST,
                    request,
                });
            }
            Role::Client if self.connected => {
                let Some(transport) = self.transport.as_mut() else {
                    return;
                };
                if let Err(e) = transport.send_to_server(Message::Request(request)) {
                    debug!(error = %e, "Failed to send request");
                }
            }
            _ => debug!("Dropping request: not connected"),
        }
    }

    fn send_to_client(&mut self, to: ClientId, update: ServerUpdate) {
        if !self.is_server() {
            debug!("Dropping update: not a server");
            return;
        }
        if to == ClientId::HOST && self.is_host() {
            self.events.push_back(SessionEvent::Update(update));
            return;
        }
        self.send_message(to, Message::Update(update));
    }

    fn broadcast(&mut self, event: WorldEvent) {
        if !self.is_server() {
            debug!("Dropping broadcast: not a server");
            return;
        }
        let update = ServerUpdate::World(event);
        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.broadcast(Message::Update(update.clone())) {
                debug!(error = %e, "Failed to broadcast update");
            }
        }
        if self.is_host() {
            self.events.push_back(SessionEvent::Update(update));
        }
    }
}

impl<T: Transport> NetSession for Session<T> {
    fn is_host(&self) -> bool {
        Session::is_host(self)
    }

    fn is_server(&self) -> bool {
        Session::is_server(self)
    }

    fn is_client(&self) -> bool {
        Session::is_client(self)
    }

    fn is_connected(&self) -> bool {
        Session::is_connected(self)
    }

    fn player_count(&self) -> usize {
        Session::player_count(self)
    }

    fn last_bound(&self) -> Option<SocketAddr> {
        Session::last_bound(self)
    }

    fn host_online(&mut self, max_players: usize) -> RelayFuture<'_, (NetStartResult, String)> {
        Session::host_online(self, max_players)
    }

    fn join_online(&mut self, join_code: &str) -> RelayFuture<'_, NetStartResult> {
        Session::join_online(self, join_code)
    }

    fn host_lan_auto_port(&mut self) -> (NetStartResult, Option<u16>) {
        Session::host_lan_auto_port(self)
    }

    fn host_lan(&mut self, port: u16) -> NetStartResult {
        Session::host_lan(self, port)
    }

    fn join_lan(&mut self, address: &str, port: u16) -> NetStartResult {
        Session::join_lan(self, address, port)
    }

    fn load_scene_for_all(&mut self, scene: &str) {
        Session::load_scene_for_all(self, scene)
    }

    fn shutdown(&mut self) {
        Session::shutdown(self)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use duckrun_core::{ItemKind, SlotUpdate, WorldItemId};

    use super::*;
    use crate::transport::{MemoryNetwork, MemoryTransport};

    fn session(net: &MemoryNetwork) -> Session<MemoryTransport> {
        Session::new(net.transport(), NetConfig::default())
    }

    fn drain(session: &mut Session<MemoryTransport>) -> Vec<SessionEvent> {
        session.update(Instant::now());
        std::iter::from_fn(|| session.poll_event()).collect()
    }

    #[test]
    fn test_host_sets_all_role_flags() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);

        assert_eq!(host.host_lan(7777), NetStartResult::Success);
        assert!(host.is_host() && host.is_server() && host.is_client());
        assert!(host.is_connected());
        assert_eq!(host.bound_port(), Some(7777));
        assert_eq!(host.player_count(), 1);
        assert_eq!(
            drain(&mut host),
            vec![
                SessionEvent::Connected,
                SessionEvent::ClientJoined(ClientId::HOST)
            ]
        );
    }

    #[test]
    fn test_serve_has_no_local_client() {
        let net = MemoryNetwork::new();
        let mut server = session(&net);

        assert_eq!(server.serve_lan(7777), NetStartResult::Success);
        assert!(server.is_server());
        assert!(!server.is_client());
        assert!(!server.is_connected());
        assert_eq!(server.player_count(), 0);
        assert!(drain(&mut server).is_empty());
    }

    #[test]
    fn test_host_on_taken_port_fails() {
        let net = MemoryNetwork::new();
        net.occupy(7777);
        let mut host = session(&net);

        assert_eq!(host.host_lan(7777), NetStartResult::TransportError);
        assert_eq!(host.role(), Role::None);
        assert_eq!(host.last_bound(), None);
    }

    #[test]
    fn test_detached_session_is_not_initialized() {
        let mut session: Session<MemoryTransport> = Session::detached(NetConfig::default());
        assert_eq!(session.host_lan(7777), NetStartResult::NotInitialized);
        assert_eq!(session.join_lan("127.0.0.1", 7777), NetStartResult::NotInitialized);
        assert_eq!(session.host_lan_auto_port(), (NetStartResult::NotInitialized, None));
    }

    #[test]
    fn test_join_rejects_blank_address() {
        let net = MemoryNetwork::new();
        let mut client = session(&net);

        assert_eq!(client.join_lan("", 7777), NetStartResult::InvalidInput);
        assert_eq!(client.join_lan("   ", 7777), NetStartResult::InvalidInput);
        assert_eq!(client.role(), Role::None);
        assert!(!client.is_joining());
    }

    #[test]
    fn test_join_while_active_is_transport_error() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        host.host_lan(7777);

        assert_eq!(host.join_lan("127.0.0.1", 7777), NetStartResult::TransportError);
        assert!(host.is_host());
    }

    #[test]
    fn test_client_connects_and_follows_scene() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        let mut client = session(&net);
        host.host_lan(7777);
        drain(&mut host);

        assert_eq!(client.join_lan("127.0.0.1", 7777), NetStartResult::Success);
        assert!(client.is_joining());
        assert_eq!(drain(&mut client), vec![SessionEvent::Connected]);
        assert!(client.is_connected());
        assert!(!client.is_joining());

        assert_eq!(drain(&mut host), vec![SessionEvent::ClientJoined(ClientId(1))]);
        assert_eq!(host.player_count(), 2);

        host.load_scene_for_all("02_Lobby");
        assert_eq!(
            drain(&mut host),
            vec![SessionEvent::SceneChange {
                scene: "02_Lobby".into()
            }]
        );
        assert_eq!(
            drain(&mut client),
            vec![SessionEvent::SceneChange {
                scene: "02_Lobby".into()
            }]
        );
        assert_eq!(client.player_count(), 2);
        assert_eq!(client.active_scene(), Some("02_Lobby"));
    }

    #[test]
    fn test_late_joiner_receives_active_scene() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        host.host_lan(7777);
        host.load_scene_for_all("02_Lobby");

        let mut client = session(&net);
        client.join_lan("127.0.0.1", 7777);
        drain(&mut host);

        assert_eq!(
            drain(&mut client),
            vec![
                SessionEvent::Connected,
                SessionEvent::SceneChange {
                    scene: "02_Lobby".into()
                }
            ]
        );
    }

    #[test]
    fn test_scene_change_ignored_on_client() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        let mut client = session(&net);
        host.host_lan(7777);
        client.join_lan("127.0.0.1", 7777);
        drain(&mut client);
        drain(&mut host);

        client.load_scene_for_all("03_Game");
        assert!(drain(&mut client).is_empty());
        assert!(drain(&mut host).is_empty());
        assert_eq!(host.active_scene(), None);
    }

    #[test]
    fn test_join_times_out() {
        let net = MemoryNetwork::new();
        net.set_unreachable("10.0.0.5".parse().unwrap());
        let mut client = session(&net);

        assert_eq!(client.join_lan("10.0.0.5", 7777), NetStartResult::Success);
        client.update(Instant::now() + Duration::from_secs(5));
        assert!(client.poll_event().is_none());
        assert!(client.is_client());

        client.update(Instant::now() + Duration::from_secs(11));
        assert_eq!(
            client.poll_event(),
            Some(SessionEvent::Disconnected {
                reason: DisconnectReason::Timeout
            })
        );
        assert_eq!(client.role(), Role::None);
        assert!(!client.transport().unwrap().is_active());
    }

    #[test]
    fn test_shutdown_cancels_join_timeout() {
        let net = MemoryNetwork::new();
        net.set_unreachable("10.0.0.5".parse().unwrap());
        let mut client = session(&net);
        client.join_lan("10.0.0.5", 7777);

        client.shutdown();
        client.update(Instant::now() + Duration::from_secs(30));
        assert!(client.poll_event().is_none());
    }

    #[test]
    fn test_refused_join_reports_disconnect() {
        let net = MemoryNetwork::new();
        let mut client = session(&net);

        assert_eq!(client.join_lan("127.0.0.1", 7777), NetStartResult::Success);
        let events = drain(&mut client);
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Disconnected {
                reason: DisconnectReason::ConnectionFailed(_)
            }]
        ));
        assert_eq!(client.role(), Role::None);
        client.update(Instant::now() + Duration::from_secs(11));
        assert!(client.poll_event().is_none());
    }

    #[test]
    fn test_host_shutdown_disconnects_clients() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        let mut client = session(&net);
        host.host_lan(7777);
        client.join_lan("127.0.0.1", 7777);
        drain(&mut client);

        host.shutdown();
        assert_eq!(
            drain(&mut client),
            vec![SessionEvent::Disconnected {
                reason: DisconnectReason::ServerShutdown
            }]
        );
        assert!(!client.is_client());
    }

    #[test]
    fn test_client_leave_updates_host() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        let mut client = session(&net);
        host.host_lan(7777);
        client.join_lan("127.0.0.1", 7777);
        drain(&mut host);

        client.shutdown();
        assert_eq!(drain(&mut host), vec![SessionEvent::ClientLeft(ClientId(1))]);
        assert_eq!(host.player_count(), 1);
    }

    #[test]
    fn test_shutdown_discards_queued_events() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        host.host_lan(7777);
        host.load_scene_for_all("03_Game");
        host.send_to_server(ClientRequest::Drop { slot: 0 });

        host.shutdown();
        host.update(Instant::now());
        assert!(host.poll_event().is_none());
    }

    #[test]
    fn test_double_shutdown_is_noop() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        host.host_lan(7777);

        host.shutdown();
        host.shutdown();
        assert_eq!(host.role(), Role::None);
        assert!(!host.is_connected());
        assert_eq!(host.player_count(), 0);
        assert_eq!(host.bound_port(), Some(7777));
        assert!(!net.is_listening(7777));
    }

    #[test]
    fn test_drop_releases_port() {
        let net = MemoryNetwork::new();
        {
            let mut host = session(&net);
            host.host_lan(7777);
            assert!(net.is_listening(7777));
        }
        assert!(!net.is_listening(7777));
    }

    #[test]
    fn test_host_rpc_loops_back() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        host.host_lan(7777);
        drain(&mut host);

        let request = ClientRequest::Pickup {
            item: WorldItemId(1),
        };
        host.send_to_server(request.clone());
        let update = ServerUpdate::Slot(SlotUpdate::Set {
            slot: 0,
            item: ItemKind::Key,
        });
        host.send_to_client(ClientId::HOST, update.clone());

        assert_eq!(
            drain(&mut host),
            vec![
                SessionEvent::Request {
                    from: ClientId::HOST,
                    request
                },
                SessionEvent::Update(update)
            ]
        );
    }

    #[test]
    fn test_client_request_reaches_host() {
        let net = MemoryNetwork::new();
        let mut host = session(&net);
        let mut client = session(&net);
        host.host_lan(7777);
        client.join_lan("127.0.0.1", 7777);
        drain(&mut client);
        drain(&mut host);

        let request = ClientRequest::Drop { slot: 1 };
        client.send_to_server(request.clone());
        assert_eq!(
            drain(&mut host),
            vec![SessionEvent::Request {
                from: ClientId(1),
                request
            }]
        );
    }

    #[test]
    fn test_relay_is_unavailable() {
        let net = MemoryNetwork::new();
        let mut session = session(&net);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let (result, code) = runtime.block_on(session.host_online(4));
        assert_eq!(result, NetStartResult::ServicesUnavailable);
        assert!(code.is_empty());
        assert_eq!(
            runtime.block_on(session.join_online("ABCD")),
            NetStartResult::ServicesUnavailable
        );
    }
}
