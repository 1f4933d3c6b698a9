//! Duckrun Core Library
//!
//! Transport-agnostic game state: items, inventories, the server-side
//! inventory authority, client-side mirrors and tick-driven timers.

pub mod authority;
pub mod error;
pub mod inventory;
pub mod invariants;
pub mod item;
pub mod replication;
pub mod scheduler;
pub mod view;

pub use authority::InventoryAuthority;
pub use error::{Error, Rejection, Result};
pub use inventory::{Inventory, InventoryConfig};
pub use item::{ClientId, ItemKind, Pose, WorldItem, WorldItemId};
pub use replication::{ClientRequest, Directive, Outbox, ServerUpdate, SlotUpdate, WorldEvent};
pub use scheduler::{Scheduler, TimerId};
pub use view::{InventoryView, WorldView};
