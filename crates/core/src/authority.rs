//! Server-side inventory authority
//!
//! The authority owns the only trusted copy of every player's slots and of
//! the spawned world items. Clients can only send [`ClientRequest`]s; each
//! request is validated here and either applied in full or rejected with no
//! state change. Requests are processed one at a time in arrival order, which
//! is what makes the unique-item guard hold under racing pickups.

use std::collections::BTreeMap;

use glam::Vec3;
use tracing::{debug, info};

use crate::error::Rejection;
use crate::inventory::{Inventory, InventoryConfig};
use crate::item::{ClientId, ItemKind, Pose, WorldItem, WorldItemId};
use crate::replication::{ClientRequest, Directive, Outbox, WorldEvent};

type Outcome<T> = std::result::Result<T, Rejection>;

struct PlayerRecord {
    inventory: Inventory,
    pose: Pose,
}

/// Authoritative inventory and world-item state
pub struct InventoryAuthority {
    config: InventoryConfig,
    players: BTreeMap<ClientId, PlayerRecord>,
    world: BTreeMap<WorldItemId, WorldItem>,
    next_item_id: u64,
    outbox: Outbox,
}

impl InventoryAuthority {
    pub fn new(config: InventoryConfig) -> Self {
        Self {
            config,
            players: BTreeMap::new(),
            world: BTreeMap::new(),
            next_item_id: 1,
            outbox: Outbox::new(),
        }
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Create an empty inventory for a newly connected client and send it the
    /// current world items
    pub fn spawn_player(&mut self, client: ClientId, pose: Pose) {
        if self.players.contains_key(&client) {
            debug!(client = %client, "Player already spawned");
            return;
        }
        self.players.insert(
            client,
            PlayerRecord {
                inventory: Inventory::new(self.config.total_slots()),
                pose,
            },
        );
        for item in self.world.values() {
            self.outbox
                .send_world(client, WorldEvent::Spawned(item.clone()));
        }
        info!(client = %client, "Player inventory spawned");
    }

    /// Remove a player. Anything they held is dropped at their last pose so
    /// unique items are never lost with the player.
    pub fn despawn_player(&mut self, client: ClientId) {
        let Some(mut record) = self.players.remove(&client) else {
            return;
        };
        let held = record.inventory.drain();
        let position = record.pose.ahead(self.config.drop_distance);
        for kind in held {
            let id = self.spawn_world_item(kind, position, None);
            debug!(client = %client, item = %id, kind = %kind, "Dropped item of departing player");
        }
        info!(client = %client, "Player inventory despawned");
    }

    /// Place an item in the world during setup
    pub fn place_item(&mut self, kind: ItemKind, position: Vec3) -> Outcome<WorldItemId> {
        if !position.is_finite() {
            return Err(Rejection::NonFinitePosition(kind));
        }
        if kind.is_unique() {
            if let Some((holder, _)) = self.holder_of(kind) {
                return Err(Rejection::AlreadyHeld(kind, holder));
            }
            if self.world.values().any(|item| item.kind == kind) {
                return Err(Rejection::AlreadyPlaced(kind));
            }
        }
        let id = self.spawn_world_item(kind, position, None);
        info!(item = %id, kind = %kind, "Item placed");
        Ok(id)
    }

    /// Validate and apply one request from `client`
    pub fn handle(&mut self, client: ClientId, request: ClientRequest) -> Outcome<()> {
        match request {
            ClientRequest::Pickup { item } => self.pickup(client, item).map(|_| ()),
            ClientRequest::Drop { slot } => self.drop_item(client, slot).map(|_| ()),
            ClientRequest::Swap { from, to } => self.swap(client, from, to),
            ClientRequest::Pose(pose) => self.update_pose(client, pose),
        }
    }

    /// Move a world item into the requester's first empty slot
    pub fn pickup(&mut self, client: ClientId, item_id: WorldItemId) -> Outcome<usize> {
        if !self.players.contains_key(&client) {
            return Err(Rejection::UnknownPlayer(client));
        }
        let kind = self
            .world
            .get(&item_id)
            .map(|item| item.kind)
            .ok_or(Rejection::ItemGone(item_id))?;
        if kind.is_unique() {
            if let Some((holder, _)) = self.holder_of(kind) {
                return Err(Rejection::AlreadyHeld(kind, holder));
            }
        }

        let record = self
            .players
            .get_mut(&client)
            .ok_or(Rejection::UnknownPlayer(client))?;
        let slot = record
            .inventory
            .first_empty()
            .ok_or(Rejection::InventoryFull)?;
        record.inventory.set(slot, Some(kind))?;

        self.world.remove(&item_id);
        self.outbox.broadcast(WorldEvent::Despawned { id: item_id });
        self.outbox.send_slot(client, slot, Some(kind));

        debug!(client = %client, item = %item_id, kind = %kind, slot = slot, "Pickup accepted");
        Ok(slot)
    }

    /// Move the item in `slot` back into the world in front of the player
    pub fn drop_item(&mut self, client: ClientId, slot: usize) -> Outcome<WorldItemId> {
        let record = self
            .players
            .get_mut(&client)
            .ok_or(Rejection::UnknownPlayer(client))?;
        let kind = record.inventory.take(slot)?;
        let position = record.pose.ahead(self.config.drop_distance);

        let id = self.spawn_world_item(kind, position, None);
        self.outbox.send_slot(client, slot, None);

        debug!(client = %client, item = %id, kind = %kind, slot = slot, "Drop accepted");
        Ok(id)
    }

    pub fn swap(&mut self, client: ClientId, from: usize, to: usize) -> Outcome<()> {
        let record = self
            .players
            .get_mut(&client)
            .ok_or(Rejection::UnknownPlayer(client))?;
        record.inventory.swap(from, to)?;
        let (a, b) = (record.inventory.get(from), record.inventory.get(to));
        self.outbox.send_slot(client, from, a);
        self.outbox.send_slot(client, to, b);
        Ok(())
    }

    /// A drop spawns at the stored pose, so only real numbers are kept
    pub fn update_pose(&mut self, client: ClientId, pose: Pose) -> Outcome<()> {
        let record = self
            .players
            .get_mut(&client)
            .ok_or(Rejection::UnknownPlayer(client))?;
        if !pose.is_finite() {
            return Err(Rejection::NonFinitePose(client));
        }
        record.pose = pose;
        Ok(())
    }

    fn spawn_world_item(
        &mut self,
        kind: ItemKind,
        position: Vec3,
        material: Option<String>,
    ) -> WorldItemId {
        let id = WorldItemId(self.next_item_id);
        self.next_item_id += 1;
        let item = WorldItem {
            id,
            kind,
            position,
            material,
        };
        self.world.insert(id, item.clone());
        self.outbox.broadcast(WorldEvent::Spawned(item));
        id
    }

    /// Which player and slot currently hold `kind`, if any
    pub fn holder_of(&self, kind: ItemKind) -> Option<(ClientId, usize)> {
        self.players.iter().find_map(|(client, record)| {
            record.inventory.slot_of(kind).map(|slot| (*client, slot))
        })
    }

    /// Number of instances of `kind` sitting in player inventories
    pub fn held_count(&self, kind: ItemKind) -> usize {
        self.players
            .values()
            .map(|r| r.inventory.slots().iter().filter(|s| **s == Some(kind)).count())
            .sum()
    }

    /// Number of instances of `kind` in slots and in the world together
    pub fn count_of(&self, kind: ItemKind) -> usize {
        let in_world = self.world.values().filter(|i| i.kind == kind).count();
        self.held_count(kind) + in_world
    }

    pub fn inventory(&self, client: ClientId) -> Option<&Inventory> {
        self.players.get(&client).map(|r| &r.inventory)
    }

    pub fn pose(&self, client: ClientId) -> Option<Pose> {
        self.players.get(&client).map(|r| r.pose)
    }

    pub fn players(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.players.keys().copied()
    }

    pub fn world_item(&self, id: WorldItemId) -> Option<&WorldItem> {
        self.world.get(&id)
    }

    pub fn world_items(&self) -> impl Iterator<Item = &WorldItem> {
        self.world.values()
    }

    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    /// Take the deliveries produced since the last call
    pub fn drain_outbox(&mut self) -> Vec<Directive> {
        self.outbox.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::{ServerUpdate, SlotUpdate};

    const A: ClientId = ClientId(1);
    const B: ClientId = ClientId(2);

    fn authority_with_players() -> InventoryAuthority {
        let mut auth = InventoryAuthority::new(InventoryConfig::default());
        auth.spawn_player(A, Pose::default());
        auth.spawn_player(B, Pose::default());
        auth.drain_outbox();
        auth
    }

    fn place_key(auth: &mut InventoryAuthority) -> WorldItemId {
        let id = auth.place_item(ItemKind::Key, Vec3::ZERO).unwrap();
        auth.drain_outbox();
        id
    }

    #[test]
    fn test_pickup_moves_item_into_first_empty_slot() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);

        assert_eq!(auth.pickup(A, key), Ok(0));
        assert_eq!(auth.inventory(A).unwrap().get(0), Some(ItemKind::Key));
        assert!(auth.world_item(key).is_none());

        let out = auth.drain_outbox();
        assert_eq!(
            out,
            vec![
                Directive::Broadcast(WorldEvent::Despawned { id: key }),
                Directive::Send {
                    to: A,
                    update: ServerUpdate::Slot(SlotUpdate::Set {
                        slot: 0,
                        item: ItemKind::Key
                    }),
                },
            ]
        );
    }

    #[test]
    fn test_racing_pickups_have_one_winner() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);

        assert!(auth.handle(A, ClientRequest::Pickup { item: key }).is_ok());
        assert_eq!(
            auth.handle(B, ClientRequest::Pickup { item: key }),
            Err(Rejection::ItemGone(key))
        );
        assert_eq!(auth.count_of(ItemKind::Key), 1);
        assert!(auth.inventory(B).unwrap().is_empty());
    }

    #[test]
    fn test_rejected_request_produces_no_messages() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);
        auth.pickup(A, key).unwrap();
        auth.drain_outbox();

        assert!(auth.pickup(B, key).is_err());
        assert!(auth.drop_item(B, 0).is_err());
        assert_eq!(auth.outbox_len(), 0);
    }

    #[test]
    fn test_second_unique_item_cannot_be_placed() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);
        assert_eq!(
            auth.place_item(ItemKind::Key, Vec3::ONE),
            Err(Rejection::AlreadyPlaced(ItemKind::Key))
        );
        auth.pickup(A, key).unwrap();
        assert_eq!(
            auth.place_item(ItemKind::Key, Vec3::ONE),
            Err(Rejection::AlreadyHeld(ItemKind::Key, A))
        );
        assert!(auth.place_item(ItemKind::Duck, Vec3::ONE).is_ok());
        assert!(auth.place_item(ItemKind::Duck, Vec3::ONE).is_ok());
    }

    #[test]
    fn test_full_inventory_leaves_item_in_world() {
        let mut auth = InventoryAuthority::new(InventoryConfig {
            hotbar_slots: 1,
            backpack_slots: 0,
            drop_distance: 1.5,
        });
        auth.spawn_player(A, Pose::default());
        let duck = auth.place_item(ItemKind::Duck, Vec3::ZERO).unwrap();
        let key = auth.place_item(ItemKind::Key, Vec3::ZERO).unwrap();
        auth.pickup(A, duck).unwrap();
        auth.drain_outbox();

        assert_eq!(auth.pickup(A, key), Err(Rejection::InventoryFull));
        assert!(auth.world_item(key).is_some());
        assert_eq!(auth.outbox_len(), 0);
    }

    #[test]
    fn test_drop_spawns_in_front_of_player() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);
        auth.pickup(A, key).unwrap();
        auth.update_pose(A, Pose::new(Vec3::new(2.0, 0.0, 0.0), Vec3::X))
            .unwrap();
        auth.drain_outbox();

        let dropped = auth.drop_item(A, 0).unwrap();
        let item = auth.world_item(dropped).unwrap();
        assert_eq!(item.kind, ItemKind::Key);
        assert_eq!(item.position, Vec3::new(3.5, 0.0, 0.0));
        assert_ne!(dropped, key);
        assert!(auth.inventory(A).unwrap().is_empty());

        let out = auth.drain_outbox();
        assert!(matches!(&out[0], Directive::Broadcast(WorldEvent::Spawned(i)) if i.id == dropped));
        assert_eq!(
            out[1],
            Directive::Send {
                to: A,
                update: ServerUpdate::Slot(SlotUpdate::Cleared { slot: 0 }),
            }
        );
    }

    #[test]
    fn test_non_finite_pose_keeps_last_good_pose() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);
        auth.pickup(A, key).unwrap();
        auth.update_pose(A, Pose::new(Vec3::new(1.0, 0.0, 0.0), Vec3::Z))
            .unwrap();

        let bad = Pose::new(Vec3::splat(f32::NAN), Vec3::new(f32::INFINITY, 0.0, 0.0));
        assert_eq!(
            auth.handle(A, ClientRequest::Pose(bad)),
            Err(Rejection::NonFinitePose(A))
        );

        let dropped = auth.drop_item(A, 0).unwrap();
        let position = auth.world_item(dropped).unwrap().position;
        assert!(position.is_finite());
        assert_eq!(position, Vec3::new(1.0, 0.0, 1.5));
    }

    #[test]
    fn test_held_count_follows_pickups_and_drops() {
        let mut auth = authority_with_players();
        let first = auth.place_item(ItemKind::Duck, Vec3::ZERO).unwrap();
        let second = auth.place_item(ItemKind::Duck, Vec3::X).unwrap();
        assert_eq!(auth.held_count(ItemKind::Duck), 0);

        auth.pickup(A, first).unwrap();
        let slot = auth.pickup(B, second).unwrap();
        assert_eq!(auth.held_count(ItemKind::Duck), 2);

        auth.drop_item(B, slot).unwrap();
        assert_eq!(auth.held_count(ItemKind::Duck), 1);
        assert_eq!(auth.count_of(ItemKind::Duck), 2);
    }

    #[test]
    fn test_non_finite_placement_is_rejected() {
        let mut auth = authority_with_players();
        let at = Vec3::new(0.0, f32::NEG_INFINITY, 0.0);
        assert_eq!(
            auth.place_item(ItemKind::Duck, at),
            Err(Rejection::NonFinitePosition(ItemKind::Duck))
        );
        assert_eq!(auth.world_items().count(), 0);
        assert_eq!(auth.outbox_len(), 0);
    }

    #[test]
    fn test_forged_drop_of_empty_slot_is_rejected() {
        let mut auth = authority_with_players();
        assert_eq!(auth.drop_item(A, 1), Err(Rejection::SlotEmpty(1)));
        assert_eq!(auth.drop_item(A, 99), Err(Rejection::SlotOutOfRange(99)));
        assert_eq!(auth.world_items().count(), 0);
    }

    #[test]
    fn test_repeated_pickup_and_drop_keeps_exactly_one_key() {
        let mut auth = authority_with_players();
        let mut key = place_key(&mut auth);
        for round in 0..50 {
            let who = if round % 2 == 0 { A } else { B };
            let slot = auth.pickup(who, key).unwrap();
            assert_eq!(auth.count_of(ItemKind::Key), 1);
            key = auth.drop_item(who, slot).unwrap();
            assert_eq!(auth.count_of(ItemKind::Key), 1);
        }
    }

    #[test]
    fn test_despawn_drops_held_items() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);
        auth.pickup(A, key).unwrap();
        auth.despawn_player(A);

        assert!(auth.inventory(A).is_none());
        assert_eq!(auth.holder_of(ItemKind::Key), None);
        assert_eq!(auth.count_of(ItemKind::Key), 1);
        assert_eq!(auth.world_items().count(), 1);
    }

    #[test]
    fn test_late_joiner_receives_world_snapshot() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);

        let late = ClientId(9);
        auth.spawn_player(late, Pose::default());
        let out = auth.drain_outbox();
        assert_eq!(out.len(), 1);
        assert!(matches!(
            &out[0],
            Directive::Send { to, update: ServerUpdate::World(WorldEvent::Spawned(item)) }
                if *to == late && item.id == key
        ));
    }

    #[test]
    fn test_swap_sends_both_slots_to_owner() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);
        auth.pickup(A, key).unwrap();
        auth.drain_outbox();

        auth.handle(A, ClientRequest::Swap { from: 0, to: 3 }).unwrap();
        assert_eq!(auth.inventory(A).unwrap().get(3), Some(ItemKind::Key));
        let out = auth.drain_outbox();
        assert_eq!(out.len(), 2);
        assert!(out
            .iter()
            .all(|d| matches!(d, Directive::Send { to, .. } if *to == A)));
    }

    #[test]
    fn test_unknown_player_requests_are_rejected() {
        let mut auth = authority_with_players();
        let key = place_key(&mut auth);
        let ghost = ClientId(42);
        assert_eq!(auth.pickup(ghost, key), Err(Rejection::UnknownPlayer(ghost)));
        assert_eq!(
            auth.update_pose(ghost, Pose::default()),
            Err(Rejection::UnknownPlayer(ghost))
        );
    }
}
