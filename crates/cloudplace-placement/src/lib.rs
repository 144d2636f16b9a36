//! cloudplace placement engine.
//!
//! Decides which machines host which services. Nothing here deploys
//! anything; the engine only maintains the assignment mapping and answers
//! whether it is complete, valid, or the default.
//!
//! # Components
//!
//! - **`matcher`** — does a machine satisfy a constraint set
//! - **`defaults`** — greedy default placement over a catalog and a pool,
//!   or everything on one controller for single-machine installs
//! - **`controller`** — editable placement state, unplaced tracking, autoplace
//! - **`codec`** — YAML save/load of the full assignment mapping

pub mod codec;
pub mod controller;
pub mod defaults;
pub mod error;
pub mod matcher;

pub use codec::{DOCUMENT_VERSION, LoadReport, SkippedService};
pub use controller::{AutoplaceOutcome, NOT_ENOUGH_MACHINES, PlacementController};
pub use defaults::{SINGLE_CONTROLLER_ID, generate_defaults, generate_single};
pub use error::{PlacementError, PlacementResult};
pub use matcher::{MatchReport, Mismatch, is_satisfied, satisfies};
