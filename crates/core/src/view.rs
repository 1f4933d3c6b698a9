//! Client-side mirrors of inventory and world state
//!
//! These copies are advisory. They decide what the local player sees and
//! gate requests for responsiveness, but the server re-validates everything.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::inventory::{Inventory, InventoryConfig};
use crate::item::{ItemKind, WorldItem, WorldItemId};
use crate::replication::{ClientRequest, SlotUpdate, WorldEvent};

/// Scroll input below this magnitude is ignored
const SCROLL_DEADZONE: f32 = 0.1;

/// Local mirror of the player's own slots plus hotbar selection
#[derive(Debug, Clone)]
pub struct InventoryView {
    slots: Inventory,
    hotbar_slots: usize,
    selected: usize,
}

impl InventoryView {
    pub fn new(config: &InventoryConfig) -> Self {
        Self {
            slots: Inventory::new(config.total_slots()),
            hotbar_slots: config.hotbar_slots,
            selected: 0,
        }
    }

    /// Apply a slot update received from the server.
    /// Returns false if the slot index does not exist locally.
    pub fn apply(&mut self, update: SlotUpdate) -> bool {
        let item = match update {
            SlotUpdate::Set { item, .. } => Some(item),
            SlotUpdate::Cleared { .. } => None,
        };
        self.slots.set(update.slot(), item).is_ok()
    }

    pub fn select_slot(&mut self, slot: usize) -> bool {
        if slot >= self.hotbar_slots {
            return false;
        }
        self.selected = slot;
        true
    }

    /// Cycle the hotbar selection by scroll direction
    pub fn scroll(&mut self, delta: f32) {
        if self.hotbar_slots == 0 {
            return;
        }
        if delta > SCROLL_DEADZONE {
            self.selected = (self.selected + 1) % self.hotbar_slots;
        } else if delta < -SCROLL_DEADZONE {
            self.selected = (self.selected + self.hotbar_slots - 1) % self.hotbar_slots;
        }
    }

    pub fn selected_slot(&self) -> usize {
        self.selected
    }

    /// Item shown in the player's hand
    pub fn held_item(&self) -> Option<ItemKind> {
        self.slots.get(self.selected)
    }

    pub fn slot(&self, slot: usize) -> Option<ItemKind> {
        self.slots.get(slot)
    }

    pub fn slots(&self) -> &[Option<ItemKind>] {
        self.slots.slots()
    }

    pub fn pickup_request(&self, item: WorldItemId) -> ClientRequest {
        ClientRequest::Pickup { item }
    }

    /// Build a drop request for the selected slot, if it appears to hold
    /// something
    pub fn drop_request(&self) -> Option<ClientRequest> {
        self.held_item()?;
        Some(ClientRequest::Drop {
            slot: self.selected,
        })
    }

    pub fn swap_request(&self, from: usize, to: usize) -> Option<ClientRequest> {
        let len = self.slots.len();
        if from >= len || to >= len || from == to {
            return None;
        }
        Some(ClientRequest::Swap { from, to })
    }

    pub fn reset(&mut self) {
        self.slots = Inventory::new(self.slots.len());
        self.selected = 0;
    }
}

/// Local mirror of the spawned world items
#[derive(Debug, Clone, Default)]
pub struct WorldView {
    items: BTreeMap<WorldItemId, WorldItem>,
}

impl WorldView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: WorldEvent) {
        match event {
            WorldEvent::Spawned(item) => {
                self.items.insert(item.id, item);
            }
            WorldEvent::Despawned { id } => {
                self.items.remove(&id);
            }
        }
    }

    pub fn get(&self, id: WorldItemId) -> Option<&WorldItem> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &WorldItem> {
        self.items.values()
    }

    pub fn count_of(&self, kind: ItemKind) -> usize {
        self.items().filter(|item| item.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Closest item within `reach` of `position`
    pub fn nearest_within(&self, position: Vec3, reach: f32) -> Option<&WorldItem> {
        self.items
            .values()
            .map(|item| (item, item.position.distance_squared(position)))
            .filter(|(_, d2)| *d2 <= reach * reach)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(item, _)| item)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
