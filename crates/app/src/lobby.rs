//! Lobby: player count, host-only start, leave

use duckrun_net::NetSession;
use tracing::info;

use crate::scenes::GAME;

#[derive(Debug, Default)]
pub struct LobbyController;

impl LobbyController {
    pub fn new() -> Self {
        Self
    }

    pub fn player_line(&self, session: &dyn NetSession) -> String {
        format!("Players: {}", session.player_count())
    }

    pub fn role_line(&self, session: &dyn NetSession) -> &'static str {
        if session.is_host() {
            "Host: you can start the game."
        } else {
            "Client: waiting for host."
        }
    }

    /// Host only. Returns false when the local player may not start.
    pub fn start_game(&self, session: &mut dyn NetSession) -> bool {
        if !session.is_host() {
            return false;
        }
        session.load_scene_for_all(GAME);
        true
    }

    /// Leave the session. The caller returns to the main menu locally.
    pub fn leave(&self, session: &mut dyn NetSession) {
        info!("Leaving lobby");
        session.shutdown();
    }
}
