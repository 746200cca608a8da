//! Application Services
//!
//! Stores that reconcile REST snapshots with pushed stream updates.
//!
//! - `FleetStore`: Inventory collections plus the live per-container metrics map
//! - `SystemStore`: Latest whole-system metrics snapshot

mod fleet_store;
mod system_store;

pub use fleet_store::{Collection, FleetState, FleetStore, Mutation, StoreError};
pub use system_store::{SystemState, SystemStore};
