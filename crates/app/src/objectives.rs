//! Round objectives shown in the status line

use duckrun_core::ItemKind;
use duckrun_net::InventoryReplicator;
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Objectives {
    ducks_total: usize,
}

impl Objectives {
    /// Every duck in the starting layout has to be found
    pub fn for_layout(layout: &[(ItemKind, Vec3)]) -> Self {
        let ducks_total = layout
            .iter()
            .filter(|(kind, _)| *kind == ItemKind::Duck)
            .count();
        Self { ducks_total }
    }

    pub fn ducks_total(&self) -> usize {
        self.ducks_total
    }

    /// Ducks currently in someone's inventory.
    ///
    /// The server counts inventories directly. A client only sees the
    /// world, so every layout duck missing from it counts as found.
    pub fn ducks_found(&self, replicator: &InventoryReplicator) -> usize {
        let found = match replicator.authority() {
            Some(authority) => authority.held_count(ItemKind::Duck),
            None => self
                .ducks_total
                .saturating_sub(replicator.world().count_of(ItemKind::Duck)),
        };
        found.min(self.ducks_total)
    }

    pub fn ducks_line(&self, found: usize) -> String {
        if found >= self.ducks_total {
            "Find rubber ducks: done".to_string()
        } else {
            format!("Find rubber ducks: {}/{}", found, self.ducks_total)
        }
    }
}
