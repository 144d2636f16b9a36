//! cloudplace-core — shared types for the cloudplace placement engine.
//!
//! Machines, services (charms), placement strata and constraint values live
//! here, along with the `cloudplace.toml` parser, the service catalog and the
//! machine inventory seam. Everything in this crate is read-only input to the
//! placement engine.

pub mod catalog;
pub mod config;
pub mod inventory;
pub mod types;

pub use catalog::{CatalogOptions, ServiceCatalog, STORAGE_SERVICES};
pub use config::{InstallMode, PlacementConfig};
pub use inventory::{InventoryFile, MachineInventory};
pub use types::*;
