//! Default placement — greedy, single pass, no backtracking.
//!
//! 1. Each isolated service, in catalog order, takes the first remaining
//!    machine that satisfies its constraints (bare metal).
//! 2. One remaining machine becomes the shared controller machine and hosts
//!    every non-isolated service (bare metal).
//!
//! Machines are tried in pool order and each is used at most once. Services
//! that find no machine are simply left out; the caller sees them as
//! unplaced.
//!
//! Single-machine installs skip the pool entirely: [`generate_single`] puts
//! every service on one placeholder controller machine.

use cloudplace_core::{Constraints, Machine, ServiceDefinition, Stratum};
use cloudplace_state::AssignmentStore;
use tracing::{debug, info, warn};

use crate::matcher::is_satisfied;

/// Machines not yet handed out, in pool order.
struct Candidates<'a> {
    remaining: Vec<&'a Machine>,
}

impl<'a> Candidates<'a> {
    fn new(pool: &'a [Machine]) -> Self {
        Self {
            remaining: pool.iter().collect(),
        }
    }

    /// Take the first remaining machine that satisfies `constraints`.
    fn take(&mut self, constraints: &Constraints) -> Option<&'a Machine> {
        let pos = self
            .remaining
            .iter()
            .position(|m| is_satisfied(m, constraints))?;
        Some(self.remaining.remove(pos))
    }
}

/// Build a default assignment for `services` over `pool`.
///
/// Pure function of its inputs: the pool is only read, and the same inputs
/// always produce the same mapping.
pub fn generate_defaults<'s>(
    services: impl IntoIterator<Item = &'s ServiceDefinition>,
    pool: &[Machine],
) -> AssignmentStore {
    let (isolated, shared): (Vec<&ServiceDefinition>, Vec<&ServiceDefinition>) =
        services.into_iter().partition(|s| s.isolate);

    let mut candidates = Candidates::new(pool);
    let mut store = AssignmentStore::new();
    let mut unplaced = 0usize;

    for service in &isolated {
        match candidates.take(&service.constraints) {
            Some(machine) => {
                store.assign(machine, service, Stratum::BareMetal);
                debug!(
                    service = %service.name,
                    machine = %machine.instance_id,
                    "isolated service placed"
                );
            }
            None => {
                unplaced += 1;
                debug!(service = %service.name, "no machine satisfies isolated service");
            }
        }
    }

    if !shared.is_empty() {
        match candidates.take(&Constraints::new()) {
            Some(controller) => {
                for service in &shared {
                    store.assign(controller, service, Stratum::BareMetal);
                }
                debug!(
                    machine = %controller.instance_id,
                    services = shared.len(),
                    "controller machine chosen"
                );
            }
            None => {
                unplaced += shared.len();
                warn!(services = shared.len(), "no machine left for controller services");
            }
        }
    }

    info!(
        machines = store.len(),
        unplaced,
        pool = pool.len(),
        "default placement generated"
    );
    store
}

/// Instance ID of the machine a single-machine install targets.
pub const SINGLE_CONTROLLER_ID: &str = "controller";

/// Build the single-machine assignment: shared services in LXC containers
/// and isolated services in KVM guests, all on [`SINGLE_CONTROLLER_ID`].
pub fn generate_single<'s>(
    services: impl IntoIterator<Item = &'s ServiceDefinition>,
) -> AssignmentStore {
    let controller =
        Machine::placeholder(SINGLE_CONTROLLER_ID, SINGLE_CONTROLLER_ID, Constraints::new());
    let mut store = AssignmentStore::new();

    for service in services {
        let stratum = if service.isolate {
            Stratum::Kvm
        } else {
            Stratum::Lxc
        };
        store.assign(&controller, service, stratum);
    }

    info!(
        services = store.machine_load(SINGLE_CONTROLLER_ID),
        "single-machine placement generated"
    );
    store
}
