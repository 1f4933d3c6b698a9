//! Network configuration

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_MAX_PORT_ATTEMPTS, DEFAULT_PORT};

/// Session and transport settings, read from the `[net]` table of the app
/// config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// First port tried by auto-port hosting and the default join port
    pub base_port: u16,
    /// Extra ports tried after `base_port`
    pub max_port_attempts: u16,
    /// Seconds a join may stay unconnected before it is abandoned
    pub join_timeout_secs: u64,
    /// Connected participants allowed, host included
    pub max_players: usize,
    /// Address LAN hosts bind to
    pub bind_address: IpAddr,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            base_port: DEFAULT_PORT,
            max_port_attempts: DEFAULT_MAX_PORT_ATTEMPTS,
            join_timeout_secs: 10,
            max_players: 8,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl NetConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    /// Remote clients a listening transport should accept. The host's own
    /// client takes one seat.
    pub fn max_remote_clients(&self) -> usize {
        self.max_players.saturating_sub(1)
    }
}
