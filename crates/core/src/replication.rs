//! Replication messages and the server outbox
//!
//! Slot contents are private to their owner and travel only inside
//! [`ServerUpdate::Slot`], which the outbox can only address to a single
//! client. World events are public and may be broadcast.

use serde::{Deserialize, Serialize};

use crate::item::{ClientId, ItemKind, Pose, WorldItem, WorldItemId};

/// Requests a client may send to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientRequest {
    Pickup { item: WorldItemId },
    Drop { slot: usize },
    Swap { from: usize, to: usize },
    Pose(Pose),
}

/// Change to one of the receiving client's own slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotUpdate {
    Set { slot: usize, item: ItemKind },
    Cleared { slot: usize },
}

impl SlotUpdate {
    pub fn slot(&self) -> usize {
        match *self {
            SlotUpdate::Set { slot, .. } | SlotUpdate::Cleared { slot } => slot,
        }
    }

    fn for_slot(slot: usize, item: Option<ItemKind>) -> Self {
        match item {
            Some(item) => SlotUpdate::Set { slot, item },
            None => SlotUpdate::Cleared { slot },
        }
    }
}

/// Public change to the set of spawned world items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    Spawned(WorldItem),
    Despawned { id: WorldItemId },
}

/// Anything the server sends to one client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerUpdate {
    Slot(SlotUpdate),
    World(WorldEvent),
}

/// One pending delivery produced by the authority
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Point-to-point delivery to exactly one client
    Send { to: ClientId, update: ServerUpdate },
    /// Delivery to every connected client
    Broadcast(WorldEvent),
}

/// Deliveries queued by the authority until the network layer flushes them
#[derive(Debug, Default)]
pub struct Outbox {
    directives: Vec<Directive>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_slot(&mut self, to: ClientId, slot: usize, item: Option<ItemKind>) {
        self.directives.push(Directive::Send {
            to,
            update: ServerUpdate::Slot(SlotUpdate::for_slot(slot, item)),
        });
    }

    pub fn send_world(&mut self, to: ClientId, event: WorldEvent) {
        self.directives.push(Directive::Send {
            to,
            update: ServerUpdate::World(event),
        });
    }

    pub fn broadcast(&mut self, event: WorldEvent) {
        self.directives.push(Directive::Broadcast(event));
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Take all queued directives in the order they were produced
    pub fn drain(&mut self) -> Vec<Directive> {
        std::mem::take(&mut self.directives)
    }
}
