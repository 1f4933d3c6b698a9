//! Error types for Duckrun Core

use thiserror::Error;

use crate::item::{ClientId, ItemKind, WorldItemId};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why the server refused an inventory request.
///
/// Rejections never travel back to the requester; the server logs them and
/// the client simply sees no state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("client {0} has no spawned inventory")]
    UnknownPlayer(ClientId),

    #[error("world item {0} is not spawned")]
    ItemGone(WorldItemId),

    #[error("{0:?} is already held by client {1}")]
    AlreadyHeld(ItemKind, ClientId),

    #[error("{0:?} already exists in the world")]
    AlreadyPlaced(ItemKind),

    #[error("inventory is full")]
    InventoryFull,

    #[error("slot {0} is out of range")]
    SlotOutOfRange(usize),

    #[error("slot {0} is empty")]
    SlotEmpty(usize),

    #[error("cannot swap slot {0} with itself")]
    SameSlot(usize),

    #[error("client {0} sent a pose with non-finite numbers")]
    NonFinitePose(ClientId),

    #[error("cannot place {0:?} at a non-finite position")]
    NonFinitePosition(ItemKind),
}
