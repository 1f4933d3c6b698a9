//! Glue between session traffic and the inventory state
//!
//! On the server, the replicator owns the [`InventoryAuthority`], feeds it
//! join/leave/request events and flushes its outbox through an
//! [`RpcChannel`]. On every participant it keeps the local
//! [`InventoryView`] and [`WorldView`] in step with the updates it receives.
//! A host does both.

use duckrun_core::invariants;
use duckrun_core::{
    ClientRequest, Directive, InventoryAuthority, InventoryConfig, InventoryView, ItemKind, Pose,
    ServerUpdate, WorldItemId, WorldView,
};
use glam::Vec3;
use tracing::{debug, warn};

use crate::session::{RpcChannel, SessionEvent};

pub struct InventoryReplicator {
    config: InventoryConfig,
    authority: Option<InventoryAuthority>,
    inventory: InventoryView,
    world: WorldView,
}

impl InventoryReplicator {
    pub fn new(config: InventoryConfig) -> Self {
        let inventory = InventoryView::new(&config);
        Self {
            config,
            authority: None,
            inventory,
            world: WorldView::new(),
        }
    }

    /// Server-side state, present once this process has accepted a player
    pub fn authority(&self) -> Option<&InventoryAuthority> {
        self.authority.as_ref()
    }

    pub fn inventory(&self) -> &InventoryView {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut InventoryView {
        &mut self.inventory
    }

    pub fn world(&self) -> &WorldView {
        &self.world
    }

    /// Forget all state, e.g. after leaving a session
    pub fn reset(&mut self) {
        self.authority = None;
        self.inventory.reset();
        self.world.clear();
    }

    /// React to one session event. Returns true if the event was inventory
    /// related.
    pub fn handle_event<R: RpcChannel>(&mut self, event: &SessionEvent, rpc: &mut R) -> bool {
        match event {
            SessionEvent::ClientJoined(id) => {
                let authority = self.authority_or_create();
                authority.spawn_player(*id, Pose::default());
                self.flush(rpc);
                true
            }
            SessionEvent::ClientLeft(id) => {
                if let Some(authority) = self.authority.as_mut() {
                    authority.despawn_player(*id);
                    self.flush(rpc);
                }
                true
            }
            SessionEvent::Request { from, request } => {
                let Some(authority) = self.authority.as_mut() else {
                    warn!(client = %from, "Request received without authority");
                    return true;
                };
                if let Err(rejection) = authority.handle(*from, request.clone()) {
                    debug!(client = %from, request = ?request, reason = %rejection, "Request rejected");
                }
                self.flush(rpc);
                true
            }
            SessionEvent::Update(ServerUpdate::Slot(update)) => {
                if !self.inventory.apply(*update) {
                    warn!(slot = update.slot(), "Slot update outside local inventory");
                }
                true
            }
            SessionEvent::Update(ServerUpdate::World(event)) => {
                self.world.apply(event.clone());
                true
            }
            SessionEvent::Disconnected { .. } => {
                self.reset();
                false
            }
            _ => false,
        }
    }

    /// Server side: put an item into the world for everyone
    pub fn place_item<R: RpcChannel>(
        &mut self,
        kind: ItemKind,
        position: Vec3,
        rpc: &mut R,
    ) -> Option<WorldItemId> {
        let placed = self.authority_or_create().place_item(kind, position);
        self.flush(rpc);
        match placed {
            Ok(id) => Some(id),
            Err(rejection) => {
                debug!(kind = %kind, reason = %rejection, "Placement rejected");
                None
            }
        }
    }

    /// Ask the server to pick up a world item
    pub fn request_pickup<R: RpcChannel>(&mut self, item: WorldItemId, rpc: &mut R) {
        rpc.send_to_server(self.inventory.pickup_request(item));
    }

    /// Pick up the closest item within `reach` of `position`
    pub fn request_pickup_nearest<R: RpcChannel>(
        &mut self,
        position: Vec3,
        reach: f32,
        rpc: &mut R,
    ) -> Option<WorldItemId> {
        let id = self.world.nearest_within(position, reach)?.id;
        self.request_pickup(id, rpc);
        Some(id)
    }

    /// Ask the server to drop the selected item. Returns false when the
    /// selected slot looks empty locally and nothing was sent.
    pub fn request_drop<R: RpcChannel>(&mut self, rpc: &mut R) -> bool {
        match self.inventory.drop_request() {
            Some(request) => {
                rpc.send_to_server(request);
                true
            }
            None => false,
        }
    }

    pub fn request_swap<R: RpcChannel>(&mut self, from: usize, to: usize, rpc: &mut R) -> bool {
        match self.inventory.swap_request(from, to) {
            Some(request) => {
                rpc.send_to_server(request);
                true
            }
            None => false,
        }
    }

    pub fn report_pose<R: RpcChannel>(&mut self, pose: Pose, rpc: &mut R) {
        rpc.send_to_server(ClientRequest::Pose(pose));
    }

    fn authority_or_create(&mut self) -> &mut InventoryAuthority {
        let config = &self.config;
        self.authority
            .get_or_insert_with(|| InventoryAuthority::new(config.clone()))
    }

    fn flush<R: RpcChannel>(&mut self, rpc: &mut R) {
        let Some(authority) = self.authority.as_mut() else {
            return;
        };
        invariants::assert_unique_items(authority);
        invariants::assert_inventory_sizes(authority);
        for directive in authority.drain_outbox() {
            match directive {
                Directive::Send { to, update } => rpc.send_to_client(to, update),
                Directive::Broadcast(event) => rpc.broadcast(event),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use duckrun_core::{ClientId, SlotUpdate, WorldEvent};

    use super::*;
    use crate::config::NetConfig;
    use crate::session::Session;
    use crate::transport::{MemoryNetwork, MemoryTransport};

    /// Records every outgoing call
    #[derive(Default)]
    struct Recorder {
        requests: Vec<ClientRequest>,
        sent: Vec<(ClientId, ServerUpdate)>,
        broadcasts: Vec<WorldEvent>,
    }

    impl RpcChannel for Recorder {
        fn local_client(&self) -> Option<ClientId> {
            Some(ClientId::HOST)
        }

        fn send_to_server(&mut self, request: ClientRequest) {
            self.requests.push(request);
        }

        fn send_to_client(&mut self, to: ClientId, update: ServerUpdate) {
            self.sent.push((to, update));
        }

        fn broadcast(&mut self, event: WorldEvent) {
            self.broadcasts.push(event);
        }
    }

    fn pump(
        session: &mut Session<MemoryTransport>,
        replicator: &mut InventoryReplicator,
    ) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        loop {
            session.update(Instant::now());
            let Some(event) = session.poll_event() else {
                return seen;
            };
            replicator.handle_event(&event, session);
            seen.push(event);
        }
    }

    #[test]
    fn test_pickup_reply_is_targeted() {
        let mut replicator = InventoryReplicator::new(InventoryConfig::default());
        let mut rpc = Recorder::default();

        replicator.handle_event(&SessionEvent::ClientJoined(ClientId(1)), &mut rpc);
        let key = replicator
            .place_item(ItemKind::Key, Vec3::ZERO, &mut rpc)
            .unwrap();
        rpc.broadcasts.clear();

        let request = SessionEvent::Request {
            from: ClientId(1),
            request: ClientRequest::Pickup { item: key },
        };
        replicator.handle_event(&request, &mut rpc);

        assert_eq!(rpc.broadcasts, vec![WorldEvent::Despawned { id: key }]);
        assert_eq!(
            rpc.sent,
            vec![(
                ClientId(1),
                ServerUpdate::Slot(SlotUpdate::Set {
                    slot: 0,
                    item: ItemKind::Key
                })
            )]
        );
    }

    #[test]
    fn test_rejected_request_sends_nothing() {
        let mut replicator = InventoryReplicator::new(InventoryConfig::default());
        let mut rpc = Recorder::default();
        replicator.handle_event(&SessionEvent::ClientJoined(ClientId(1)), &mut rpc);

        let request = SessionEvent::Request {
            from: ClientId(1),
            request: ClientRequest::Drop { slot: 0 },
        };
        assert!(replicator.handle_event(&request, &mut rpc));
        assert!(rpc.sent.is_empty());
        assert!(rpc.broadcasts.is_empty());
    }

    #[test]
    fn test_drop_is_gated_locally() {
        let mut replicator = InventoryReplicator::new(InventoryConfig::default());
        let mut rpc = Recorder::default();

        assert!(!replicator.request_drop(&mut rpc));
        assert!(rpc.requests.is_empty());

        replicator.handle_event(
            &SessionEvent::Update(ServerUpdate::Slot(SlotUpdate::Set {
                slot: 0,
                item: ItemKind::Duck,
            })),
            &mut rpc,
        );
        assert!(replicator.request_drop(&mut rpc));
        assert_eq!(rpc.requests, vec![ClientRequest::Drop { slot: 0 }]);
    }

    #[test]
    fn test_host_picks_up_through_loopback() {
        let net = MemoryNetwork::new();
        let mut session = Session::new(net.transport(), NetConfig::default());
        let mut replicator = InventoryReplicator::new(InventoryConfig::default());

        session.host_lan(7777);
        pump(&mut session, &mut replicator);
        let key = replicator
            .place_item(ItemKind::Key, Vec3::new(1.0, 0.0, 0.0), &mut session)
            .unwrap();
        pump(&mut session, &mut replicator);
        assert!(replicator.world().get(key).is_some());

        let picked = replicator.request_pickup_nearest(Vec3::ZERO, 2.0, &mut session);
        assert_eq!(picked, Some(key));
        pump(&mut session, &mut replicator);

        assert_eq!(replicator.inventory().held_item(), Some(ItemKind::Key));
        assert!(replicator.world().is_empty());
        let authority = replicator.authority().unwrap();
        assert_eq!(authority.holder_of(ItemKind::Key), Some((ClientId::HOST, 0)));
    }

    #[test]
    fn test_late_joiner_sees_existing_items() {
        let net = MemoryNetwork::new();
        let mut host = Session::new(net.transport(), NetConfig::default());
        let mut host_side = InventoryReplicator::new(InventoryConfig::default());
        host.host_lan(7777);
        pump(&mut host, &mut host_side);
        host_side.place_item(ItemKind::Duck, Vec3::ZERO, &mut host);
        host_side.place_item(ItemKind::Key, Vec3::ONE, &mut host);

        let mut client = Session::new(net.transport(), NetConfig::default());
        let mut client_side = InventoryReplicator::new(InventoryConfig::default());
        client.join_lan("127.0.0.1", 7777);
        pump(&mut client, &mut client_side);
        pump(&mut host, &mut host_side);
        pump(&mut client, &mut client_side);

        assert_eq!(client_side.world().len(), 2);
    }

    #[test]
    fn test_disconnect_clears_views() {
        let mut replicator = InventoryReplicator::new(InventoryConfig::default());
        let mut rpc = Recorder::default();
        replicator.handle_event(
            &SessionEvent::Update(ServerUpdate::Slot(SlotUpdate::Set {
                slot: 1,
                item: ItemKind::Duck,
            })),
            &mut rpc,
        );

        let reason = crate::transport::DisconnectReason::ServerShutdown;
        replicator.handle_event(&SessionEvent::Disconnected { reason }, &mut rpc);
        assert_eq!(replicator.inventory().slot(1), None);
    }
}
