//! Duckrun Network Library
//!
//! Sessions, transports and inventory replication for LAN play.
//!
//! # Architecture
//!
//! - **Transport**: moves [`Message`]s between one server and its clients.
//!   [`TcpTransport`] runs over tokio sockets; [`MemoryTransport`] routes
//!   in-process for tests and local play.
//! - **Session**: role and connection lifecycle on top of a transport, with
//!   host-driven scene changes and a join timeout.
//! - **Auto-port**: hosts on the first free port in a range.
//! - **Replication**: routes inventory requests to the server authority and
//!   its targeted updates back to each owner.
//! - **Protocol**: length-prefixed JSON messages.
//!
//! # Usage
//!
//! ```ignore
//! let transport = TcpTransport::new(runtime.handle().clone());
//! let mut session = Session::new(transport, NetConfig::default());
//!
//! let (result, port) = session.host_lan_auto_port();
//! loop {
//!     session.update(Instant::now());
//!     while let Some(event) = session.poll_event() {
//!         replicator.handle_event(&event, &mut session);
//!     }
//! }
//! ```

mod client;
pub mod autoport;
pub mod config;
pub mod error;
mod frame;
pub mod lan;
pub mod protocol;
pub mod replication;
mod server;
pub mod session;
pub mod transport;

pub use autoport::HostAttempt;
pub use config::NetConfig;
pub use error::{Error, NetStartResult, Result};
pub use protocol::Message;
pub use replication::InventoryReplicator;
pub use session::{NetSession, RelayFuture, Role, RpcChannel, Session, SessionEvent};
pub use transport::{
    DisconnectReason, MemoryNetwork, MemoryTransport, TcpTransport, Transport, TransportEvent,
};

/// Default LAN port
pub const DEFAULT_PORT: u16 = 7777;

/// Fallback ports tried after [`DEFAULT_PORT`] when hosting
pub const DEFAULT_MAX_PORT_ATTEMPTS: u16 = 15;
