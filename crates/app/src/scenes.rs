//! Scene names and the starting item layout

use std::fmt;

use duckrun_core::ItemKind;
use glam::Vec3;

pub const MAIN_MENU: &str = "01_MainMenu";
pub const LOBBY: &str = "02_Lobby";
pub const GAME: &str = "03_Game";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    MainMenu,
    Lobby,
    Game,
}

impl Scene {
    pub fn name(self) -> &'static str {
        match self {
            Scene::MainMenu => MAIN_MENU,
            Scene::Lobby => LOBBY,
            Scene::Game => GAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            MAIN_MENU => Some(Scene::MainMenu),
            LOBBY => Some(Scene::Lobby),
            GAME => Some(Scene::Game),
            _ => None,
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Items the server places when the game scene starts
pub fn game_layout() -> Vec<(ItemKind, Vec3)> {
    vec![
        (ItemKind::Key, Vec3::new(4.0, 0.0, 12.0)),
        (ItemKind::Duck, Vec3::new(-3.0, 0.0, 2.0)),
        (ItemKind::Duck, Vec3::new(6.5, 1.0, -4.0)),
        (ItemKind::Duck, Vec3::new(0.0, 0.0, 8.0)),
        (ItemKind::Duck, Vec3::new(-7.0, 0.0, -6.0)),
        (ItemKind::Duck, Vec3::new(9.0, 2.0, 10.0)),
        (ItemKind::Duck, Vec3::new(2.5, 0.0, -11.0)),
    ]
}
