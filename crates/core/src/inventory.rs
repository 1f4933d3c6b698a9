//! Fixed-size inventory slot arrays
//!
//! Slots `0..hotbar_slots` form the hotbar (selectable, shown in hand);
//! the remaining slots are the backpack.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Rejection, Result};
use crate::item::ItemKind;

/// Inventory layout and drop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub hotbar_slots: usize,
    pub backpack_slots: usize,
    /// Distance in front of the player where dropped items appear
    pub drop_distance: f32,
}

impl InventoryConfig {
    pub fn total_slots(&self) -> usize {
        self.hotbar_slots + self.backpack_slots
    }

    pub fn validate(&self) -> Result<()> {
        if self.hotbar_slots == 0 {
            return Err(Error::InvalidConfig(
                "inventory needs at least one hotbar slot".into(),
            ));
        }
        if !self.drop_distance.is_finite() || self.drop_distance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "drop distance must be a non-negative number, got {}",
                self.drop_distance
            )));
        }
        Ok(())
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            hotbar_slots: 2,
            backpack_slots: 3,
            drop_distance: 1.5,
        }
    }
}

/// One player's slot array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    slots: Vec<Option<ItemKind>>,
}

impl Inventory {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn get(&self, slot: usize) -> Option<ItemKind> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn slots(&self) -> &[Option<ItemKind>] {
        &self.slots
    }

    pub fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn contains(&self, kind: ItemKind) -> bool {
        self.slot_of(kind).is_some()
    }

    pub fn slot_of(&self, kind: ItemKind) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(kind))
    }

    /// Overwrite a slot. Returns the previous content.
    pub fn set(&mut self, slot: usize, item: Option<ItemKind>) -> std::result::Result<Option<ItemKind>, Rejection> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(Rejection::SlotOutOfRange(slot))?;
        Ok(std::mem::replace(entry, item))
    }

    /// Empty a slot that must currently hold an item
    pub fn take(&mut self, slot: usize) -> std::result::Result<ItemKind, Rejection> {
        let entry = self
            .slots
            .get_mut(slot)
            .ok_or(Rejection::SlotOutOfRange(slot))?;
        entry.take().ok_or(Rejection::SlotEmpty(slot))
    }

    pub fn swap(&mut self, a: usize, b: usize) -> std::result::Result<(), Rejection> {
        if a >= self.slots.len() {
            return Err(Rejection::SlotOutOfRange(a));
        }
        if b >= self.slots.len() {
            return Err(Rejection::SlotOutOfRange(b));
        }
        if a == b {
            return Err(Rejection::SameSlot(a));
        }
        self.slots.swap(a, b);
        Ok(())
    }

    /// Empty every slot, returning what was held
    pub fn drain(&mut self) -> Vec<ItemKind> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}
