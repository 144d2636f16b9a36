//! cloudplace-state — the assignment store.
//!
//! Holds which services are placed on which machines, and how (bare metal,
//! LXC container or KVM guest). The store is a plain in-memory value; it
//! keeps a snapshot of every machine it references so it never depends on
//! the live machine pool being reachable.
//!
//! # Invariants
//!
//! - A service that does not allow multiple units appears at most once in
//!   the whole store.
//! - Reads never fail and never grow the store: an unknown machine reads as
//!   three empty strata.

pub mod error;
pub mod store;

pub use error::{StateError, StateResult};
pub use store::{AssignmentStore, MachineAssignments, ServicePlacements, StratumServices};
