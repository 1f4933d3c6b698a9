//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::authority::InventoryAuthority;
use crate::item::ItemKind;
use crate::view::InventoryView;

/// Validate that no unique item exists more than once across all slots and
/// the world
pub fn assert_unique_items(authority: &InventoryAuthority) {
    for kind in [ItemKind::Key, ItemKind::Duck] {
        if !kind.is_unique() {
            continue;
        }
        let count = authority.count_of(kind);
        debug_assert!(count <= 1, "{} exists {} times, expected at most 1", kind, count);
    }
}

/// Validate that every inventory has the configured size
pub fn assert_inventory_sizes(authority: &InventoryAuthority) {
    let expected = authority.config().total_slots();
    for client in authority.players() {
        let len = authority.inventory(client).map(|i| i.len());
        debug_assert!(
            len == Some(expected),
            "Client {} has {:?} slots, expected {}",
            client,
            len,
            expected
        );
    }
}

/// Validate that the local selection stays inside the hotbar
pub fn assert_view_selection(view: &InventoryView, hotbar_slots: usize) {
    debug_assert!(
        view.selected_slot() < hotbar_slots.max(1),
        "Selected slot {} outside hotbar of {}",
        view.selected_slot(),
        hotbar_slots
    );
}
