//! Identifiers and item types shared by server and clients

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Network participant identifier.
///
/// The host's own local client is always [`ClientId::HOST`]; remote clients
/// are numbered from 1 upward by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl ClientId {
    pub const HOST: ClientId = ClientId(0);
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one spawned world object.
///
/// Pickup requests carry this instance id rather than an item kind, so a
/// request for an object that was already picked up cannot match anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldItemId(pub u64);

impl fmt::Display for WorldItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kinds of items that can be held in an inventory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// The elevator key. Only one may exist per session.
    Key,
    /// Collectible rubber duck
    Duck,
}

impl ItemKind {
    /// Unique kinds are subject to the duplication guard
    pub fn is_unique(self) -> bool {
        matches!(self, ItemKind::Key)
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Key => "key",
            ItemKind::Duck => "duck",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "key" => Some(ItemKind::Key),
            "duck" => Some(ItemKind::Duck),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A droppable item currently spawned in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldItem {
    pub id: WorldItemId,
    pub kind: ItemKind,
    pub position: Vec3,
    /// Cosmetic only; never consulted for validation
    #[serde(default)]
    pub material: Option<String>,
}

/// Player position and facing as last reported by the owning client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub forward: Vec3,
}

impl Pose {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward }
    }

    /// Both vectors hold real numbers, no NaN or infinity
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.forward.is_finite()
    }

    /// Point `distance` units in front of the player
    pub fn ahead(&self, distance: f32) -> Vec3 {
        self.position + self.forward.normalize_or_zero() * distance
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::Z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_key_is_unique() {
        assert!(ItemKind::Key.is_unique());
        assert!(!ItemKind::Duck.is_unique());
    }

    #[test]
    fn test_parse_item_kind() {
        assert_eq!(ItemKind::parse("Key"), Some(ItemKind::Key));
        assert_eq!(ItemKind::parse(" duck "), Some(ItemKind::Duck));
        assert_eq!(ItemKind::parse("goose"), None);
    }

    #[test]
    fn test_pose_ahead_normalizes_forward() {
        let pose = Pose::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 4.0));
        assert_eq!(pose.ahead(1.5), Vec3::new(1.0, 0.0, 1.5));
    }

    #[test]
    fn test_pose_ahead_with_zero_forward_stays_put() {
        let pose = Pose::new(Vec3::ONE, Vec3::ZERO);
        assert_eq!(pose.ahead(1.5), Vec3::ONE);
    }
}
