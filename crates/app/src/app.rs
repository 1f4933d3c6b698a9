//! Root application object
//!
//! `App` owns the one session for the process along with the replicator,
//! the scene the player is in and the menu/lobby controllers. Everything is
//! driven from [`App::tick`] and [`App::execute`] on a single thread.

use std::time::Instant;

use duckrun_core::{invariants, ItemKind, Pose, WorldItemId};
use duckrun_net::{InventoryReplicator, Session, SessionEvent, Transport};
use glam::Vec3;
use tracing::{debug, info, warn};

use crate::commands::{Command, HELP};
use crate::config::AppConfig;
use crate::lobby::LobbyController;
use crate::menu::MenuController;
use crate::objectives::Objectives;
use crate::scenes::{self, Scene};

/// What the caller should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<T: Transport> {
    config: AppConfig,
    session: Session<T>,
    replicator: InventoryReplicator,
    menu: MenuController,
    lobby: LobbyController,
    objectives: Objectives,
    scene: Scene,
    pose: Pose,
    output: Vec<String>,
}

impl<T: Transport> App<T> {
    pub fn new(transport: T, config: AppConfig) -> Self {
        let session = Session::new(transport, config.net.clone());
        let replicator = InventoryReplicator::new(config.inventory.clone());
        info!(
            base_port = config.net.base_port,
            max_players = config.net.max_players,
            "Session ready"
        );
        Self {
            config,
            session,
            replicator,
            menu: MenuController::new(),
            lobby: LobbyController::new(),
            objectives: Objectives::for_layout(&scenes::game_layout()),
            scene: Scene::MainMenu,
            pose: Pose::default(),
            output: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    #[cfg(test)]
    pub fn replicator(&self) -> &InventoryReplicator {
        &self.replicator
    }

    #[cfg(test)]
    pub fn scene(&self) -> Scene {
        self.scene
    }

    #[cfg(test)]
    pub fn menu_status(&self) -> &str {
        self.menu.status()
    }

    /// Lines produced since the last call, for the player to read
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn say(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    fn say_status(&mut self) {
        let status = self.menu.status().to_string();
        self.say(status);
    }

    pub fn host(&mut self) {
        self.replicator.reset();
        self.menu.host_lan(&mut self.session);
        self.say_status();
    }

    pub fn join(&mut self, address: &str, port: Option<&str>) {
        self.replicator.reset();
        let default_port = self.config.net.base_port.to_string();
        let port = port.unwrap_or(&default_port);
        self.menu.join_lan(&mut self.session, address, port);
        self.say_status();
    }

    /// Dedicated server. No local player, so the lobby is skipped.
    pub fn serve(&mut self, port: u16) {
        self.replicator.reset();
        let result = self.session.serve_lan(port);
        if result.is_success() {
            let port = self.session.bound_port().unwrap_or(port);
            self.say(format!("Serving on {}", duckrun_net::lan::display_address(port)));
            self.enter_scene(Scene::Game);
        } else {
            self.say(format!("Serve LAN: {}", result));
        }
    }

    pub async fn host_online(&mut self) {
        let max_players = self.config.net.max_players;
        self.menu.host_online(&mut self.session, max_players).await;
        self.say_status();
    }

    pub async fn join_online(&mut self, join_code: &str) {
        self.replicator.reset();
        self.menu.join_online(&mut self.session, join_code).await;
        self.say_status();
    }

    /// Pump the session and react to everything it reports
    pub fn tick(&mut self, now: Instant) {
        self.session.update(now);
        while let Some(event) = self.session.poll_event() {
            self.replicator.handle_event(&event, &mut self.session);
            self.handle_event(event);
            // Host loopback and scene changes may have queued more work
            self.session.update(now);
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                self.menu.on_connected(&mut self.session);
                self.say_status();
            }
            SessionEvent::Disconnected { reason } => {
                self.menu.on_disconnected(&reason);
                self.say_status();
                self.enter_scene(Scene::MainMenu);
            }
            SessionEvent::SceneChange { scene } => {
                if !self.session.is_client() && !self.session.is_server() {
                    debug!(scene = %scene, "Scene change outside a session");
                    return;
                }
                match Scene::from_name(&scene) {
                    Some(scene) => self.enter_scene(scene),
                    None => warn!(scene = %scene, "Unknown scene"),
                }
            }
            SessionEvent::ClientJoined(id) | SessionEvent::ClientLeft(id) => {
                debug!(client = %id, "Participants changed");
                if self.scene == Scene::Lobby {
                    let line = self.lobby.player_line(&self.session);
                    self.say(line);
                }
            }
            SessionEvent::Update(_) | SessionEvent::Request { .. } => {}
        }
    }

    fn enter_scene(&mut self, scene: Scene) {
        if self.scene == scene {
            return;
        }
        info!(from = %self.scene, to = %scene, "Scene change");
        self.scene = scene;
        match scene {
            Scene::MainMenu => self.replicator.reset(),
            Scene::Lobby => {
                let players = self.lobby.player_line(&self.session);
                let role = self.lobby.role_line(&self.session);
                self.say(format!("Lobby. {} {}", players, role));
            }
            Scene::Game => {
                if self.session.is_server() {
                    for (kind, position) in scenes::game_layout() {
                        self.replicator.place_item(kind, position, &mut self.session);
                    }
                }
                self.say("Game started. Find the key.");
            }
        }
    }

    /// Run one player command
    pub fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Help => self.say(HELP),
            Command::Status => self.report_status(),
            Command::Host => self.host(),
            Command::Join { address, port } => self.join(&address, port.as_deref()),
            Command::Start => {
                if self.scene != Scene::Lobby {
                    self.say("Not in the lobby.");
                } else if !self.lobby.start_game(&mut self.session) {
                    self.say("Only the host can start the game.");
                }
            }
            Command::Leave => self.leave(),
            Command::Pickup(id) => self.pickup(id),
            Command::Drop => {
                if !self.replicator.request_drop(&mut self.session) {
                    self.say("Nothing in hand.");
                }
            }
            Command::Select(slot) => {
                if !self.replicator.inventory_mut().select_slot(slot) {
                    self.say(format!("No hotbar slot {}.", slot + 1));
                }
                self.check_selection();
            }
            Command::Scroll(delta) => {
                self.replicator.inventory_mut().scroll(delta);
                self.check_selection();
            }
            Command::Swap(from, to) => {
                if !self.replicator.request_swap(from, to, &mut self.session) {
                    self.say("Cannot swap those slots.");
                }
            }
            Command::Place(kind, position) => self.place(kind, position),
            Command::Move(position) => {
                self.pose.position = position;
                self.replicator.report_pose(self.pose, &mut self.session);
            }
            Command::Face(forward) => {
                self.pose.forward = forward;
                self.replicator.report_pose(self.pose, &mut self.session);
            }
            Command::Quit => {
                self.quit();
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    fn check_selection(&self) {
        invariants::assert_view_selection(
            self.replicator.inventory(),
            self.config.inventory.hotbar_slots,
        );
    }

    fn pickup(&mut self, id: Option<WorldItemId>) {
        if self.scene != Scene::Game {
            self.say("Nothing to pick up here.");
            return;
        }
        match id {
            Some(id) => self.replicator.request_pickup(id, &mut self.session),
            None => {
                let reach = self.config.player.reach;
                if self
                    .replicator
                    .request_pickup_nearest(self.pose.position, reach, &mut self.session)
                    .is_none()
                {
                    self.say("Nothing in reach.");
                }
            }
        }
    }

    fn place(&mut self, kind: ItemKind, position: Vec3) {
        if !self.session.is_server() {
            self.say("Only the server can place items.");
            return;
        }
        match self.replicator.place_item(kind, position, &mut self.session) {
            Some(id) => self.say(format!("Placed {} {}", kind, id)),
            None => self.say(format!("Cannot place another {}.", kind)),
        }
    }

    fn leave(&mut self) {
        if !self.session.is_server() && !self.session.is_client() {
            self.say("Not in a session.");
            return;
        }
        self.lobby.leave(&mut self.session);
        self.enter_scene(Scene::MainMenu);
        self.say("Left the session.");
    }

    fn report_status(&mut self) {
        let role = self.session.role();
        let connected = self.session.is_connected();
        self.say(format!(
            "role: {} connected: {} scene: {} players: {}",
            role,
            connected,
            self.scene,
            self.session.player_count()
        ));

        let inventory = self.replicator.inventory();
        let slots: Vec<String> = inventory
            .slots()
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let marker = if i == inventory.selected_slot() { "*" } else { " " };
                let item = slot.map(|k| k.name()).unwrap_or("-");
                format!("{}{}:{}", marker, i, item)
            })
            .collect();
        let slots = slots.join(" ");
        let held = inventory
            .held_item()
            .map(|k| k.name())
            .unwrap_or("nothing");
        self.say(format!("slots: {}  in hand: {}", slots, held));

        let items: Vec<String> = self
            .replicator
            .world()
            .items()
            .map(|item| {
                format!(
                    "{} {} ({:.1}, {:.1}, {:.1})",
                    item.id, item.kind, item.position.x, item.position.y, item.position.z
                )
            })
            .collect();
        if !items.is_empty() {
            self.say(format!("world: {}", items.join(", ")));
        }

        if self.scene == Scene::Game {
            let found = self.objectives.ducks_found(&self.replicator);
            let line = self.objectives.ducks_line(found);
            self.say(format!("objectives: {}", line));
        }
    }

    /// Shut networking down before the process exits
    pub fn quit(&mut self) {
        info!("Application quitting; shutting down network");
        self.session.shutdown();
    }
}
