//! Main menu: hosting and joining
//!
//! The controller only talks to the session through [`NetSession`] and keeps
//! a single status line for the player to read.

use duckrun_net::{lan, DisconnectReason, NetSession, NetStartResult};
use tracing::info;

use crate::scenes::LOBBY;

#[derive(Debug, Default)]
pub struct MenuController {
    status: String,
}

impl MenuController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        info!(status = %self.status, "Menu status");
    }

    /// Host on the first free LAN port
    pub fn host_lan(&mut self, session: &mut dyn NetSession) -> NetStartResult {
        self.set_status("Starting LAN host...");
        let (result, port) = session.host_lan_auto_port();
        match (result, port) {
            (NetStartResult::Success, Some(port)) => {
                self.set_status(format!("Hosting on {}", lan::display_address(port)));
            }
            _ => self.set_status(format!("Host LAN: {}", result)),
        }
        result
    }

    /// Join a LAN host from the text the player typed
    pub fn join_lan(
        &mut self,
        session: &mut dyn NetSession,
        address: &str,
        port: &str,
    ) -> NetStartResult {
        if address.trim().is_empty() {
            self.set_status("Enter the host IP address.");
            return NetStartResult::InvalidInput;
        }
        let Ok(port) = port.trim().parse::<u16>() else {
            self.set_status("Enter the host port number.");
            return NetStartResult::InvalidInput;
        };

        self.set_status("Joining... (waiting for connection)");
        let result = session.join_lan(address, port);
        if !result.is_success() {
            self.set_status(format!("Join LAN: {}", result));
        }
        result
    }

    pub async fn host_online(&mut self, session: &mut dyn NetSession, max_players: usize) {
        self.set_status("Starting online host...");
        let (result, join_code) = session.host_online(max_players).await;
        if result.is_success() {
            self.set_status(format!("Hosting online. Join code: {}", join_code));
        } else {
            self.set_status(format!("Host Online: {}", result));
        }
    }

    pub async fn join_online(&mut self, session: &mut dyn NetSession, join_code: &str) {
        if join_code.trim().is_empty() {
            self.set_status("Enter a join code.");
            return;
        }
        self.set_status("Joining online...");
        let result = session.join_online(join_code).await;
        if !result.is_success() {
            self.set_status(format!("Join Online: {}", result));
        }
    }

    /// The local participant connected. A host moves everyone to the lobby.
    pub fn on_connected(&mut self, session: &mut dyn NetSession) {
        if session.is_host() {
            self.set_status("Connected (Host). Loading Lobby...");
            session.load_scene_for_all(LOBBY);
        } else {
            self.set_status("Connected (Client). Waiting for host...");
        }
    }

    pub fn on_disconnected(&mut self, reason: &DisconnectReason) {
        self.set_status(format!("Disconnected: {}", reason));
    }
}
