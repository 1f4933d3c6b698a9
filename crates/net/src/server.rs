//! TCP listener side of the transport
//!
//! Accepts connections, runs the `Hello`/`Welcome` handshake, assigns client
//! ids and forwards every inbound frame to the transport's event channel.
//! Outbound frames go through one writer task per peer, so messages to a
//! single peer keep their send order.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use duckrun_core::ClientId;
use parking_lot::Mutex;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Message, PROTOCOL_VERSION};
use crate::transport::TransportEvent;

/// Heartbeat interval in milliseconds
const HEARTBEAT_INTERVAL_MS: u64 = 2000;

/// A connection that has not said `Hello` within this window is dropped
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connected peer state
struct Peer {
    tx: mpsc::UnboundedSender<Message>,
}

/// Server state shared across tasks
struct ServerShared {
    peers: Mutex<HashMap<ClientId, Peer>>,
    next_client: AtomicU64,
    max_clients: usize,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerShared {
    fn emit(&self, event: TransportEvent) {
        // The receiver is gone once the transport has been shut down
        let _ = self.events.send(event);
    }
}

/// Listening server handle
pub(crate) struct ServerHandle {
    addr: SocketAddr,
    shared: Arc<ServerShared>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ServerHandle {
    /// Bind synchronously so the caller learns about port conflicts at once,
    /// then hand the listener to the runtime
    pub(crate) fn start(
        runtime: &Handle,
        bind: SocketAddr,
        max_clients: usize,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self> {
        let std_listener = std::net::TcpListener::bind(bind)?;
        std_listener.set_nonblocking(true)?;

        let _guard = runtime.enter();
        let listener = TcpListener::from_std(std_listener)?;
        let addr = listener.local_addr()?;

        info!(addr = %addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let shared = Arc::new(ServerShared {
            peers: Mutex::new(HashMap::new()),
            next_client: AtomicU64::new(1),
            max_clients,
            events,
        });

        runtime.spawn(accept_loop(
            listener,
            shared.clone(),
            shutdown_tx.clone(),
        ));
        runtime.spawn(heartbeat_task(shared.clone(), shutdown_tx.subscribe()));

        Ok(Self {
            addr,
            shared,
            shutdown_tx,
        })
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue a message for one peer
    pub(crate) fn send(&self, to: ClientId, msg: Message) -> Result<()> {
        let peers = self.shared.peers.lock();
        let peer = peers.get(&to).ok_or(Error::UnknownClient(to))?;
        peer.tx.send(msg).map_err(|_| Error::ConnectionClosed)
    }

    /// Queue a message for every peer
    pub(crate) fn broadcast(&self, msg: Message) {
        let peers = self.shared.peers.lock();
        for (id, peer) in peers.iter() {
            if peer.tx.send(msg.clone()).is_err() {
                debug!(client = %id, "Failed to queue message for peer");
            }
        }
    }

    /// Tell peers we are going away, then stop every task
    pub(crate) fn shutdown(&self) {
        {
            let mut peers = self.shared.peers.lock();
            for peer in peers.values() {
                let _ = peer.tx.send(Message::ServerShutdown);
            }
            // Dropping the senders lets each writer flush and exit
            peers.clear();
        }
        let _ = self.shutdown_tx.send(());
        info!(addr = %self.addr, "Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    shared: Arc<ServerShared>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        let _ = stream.set_nodelay(true);
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            shared.clone(),
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    shared: Arc<ServerShared>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, mut writer) = tokio::io::split(stream);

    let client_id = match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&mut reader, &shared)).await {
        Ok(Ok(id)) => id,
        Ok(Err(e)) => {
            warn!(addr = %addr, error = %e, "Handshake failed");
            if let Error::Rejected(reason) = e {
                let _ = write_frame(&mut writer, &Message::Rejected { reason }).await;
            }
            return;
        }
        Err(_) => {
            warn!(addr = %addr, "Handshake timed out");
            return;
        }
    };

    if let Err(e) = write_frame(&mut writer, &Message::Welcome { client_id }).await {
        warn!(addr = %addr, error = %e, "Failed to send welcome");
        return;
    }

    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    shared.peers.lock().insert(client_id, Peer { tx: msg_tx });
    let writer_handle = tokio::spawn(writer_task(writer, msg_rx));

    shared.emit(TransportEvent::PeerConnected(client_id));
    info!(addr = %addr, client = %client_id, "Peer joined");

    loop {
        tokio::select! {
            result = read_frame(&mut reader) => {
                match result {
                    Ok(Message::Pong) => {}
                    Ok(message) => {
                        shared.emit(TransportEvent::FromClient { from: client_id, message });
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!(client = %client_id, "Connection closed");
                        break;
                    }
                    Err(e) => {
                        warn!(client = %client_id, error = %e, "Read error");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                // Let the writer flush the shutdown notice before the socket closes
                shared.peers.lock().remove(&client_id);
                let _ = writer_handle.await;
                return;
            }
        }
    }

    writer_handle.abort();
    let removed = shared.peers.lock().remove(&client_id).is_some();
    if removed {
        shared.emit(TransportEvent::PeerDisconnected(client_id));
    }

    info!(client = %client_id, "Peer disconnected");
}

/// Validate the `Hello` frame and reserve a client id
async fn handshake(reader: &mut ReadHalf<TcpStream>, shared: &ServerShared) -> Result<ClientId> {
    match read_frame(reader).await? {
        Message::Hello { version } => {
            if version != PROTOCOL_VERSION {
                return Err(Error::Rejected(format!(
                    "Protocol version {} not supported (expected {})",
                    version, PROTOCOL_VERSION
                )));
            }
            if shared.peers.lock().len() >= shared.max_clients {
                return Err(Error::Rejected("Server full".into()));
            }
            Ok(ClientId(shared.next_client.fetch_add(1, Ordering::Relaxed)))
        }
        _ => Err(Error::Protocol("Expected Hello".into())),
    }
}

/// Writer task - sends messages to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Heartbeat task - pings all peers every 2s
async fn heartbeat_task(shared: Arc<ServerShared>, mut shutdown_rx: broadcast::Receiver<()>) {
    let interval = Duration::from_millis(HEARTBEAT_INTERVAL_MS);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let peers = shared.peers.lock();
                for peer in peers.values() {
                    let _ = peer.tx.send(Message::Ping);
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Heartbeat task shutting down");
                break;
            }
        }
    }
}
