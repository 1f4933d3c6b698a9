//! Network protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire.

use duckrun_core::{ClientId, ClientRequest, ServerUpdate};
use serde::{Deserialize, Serialize};

/// Bumped whenever a message changes shape
pub const PROTOCOL_VERSION: u32 = 1;

/// Network protocol messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    /// Client introduces itself; must be the first frame on a connection
    Hello { version: u32 },

    /// Server accepts the connection and assigns the client its id
    Welcome { client_id: ClientId },

    /// Server refuses the connection
    Rejected { reason: String },

    /// Host-driven scene transition; clients follow
    LoadScene { scene: String },

    /// Number of connected participants, host included
    PlayerCount { count: usize },

    /// Gameplay request from a client
    Request(ClientRequest),

    /// Gameplay update from the server
    Update(ServerUpdate),

    /// Keep-alive from the server
    Ping,

    /// Keep-alive answer from a client
    Pong,

    /// Server is shutting down
    ServerShutdown,
}

impl Message {
    /// Serialize message to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
