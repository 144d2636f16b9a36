//! AssignmentStore — machine → stratum → ordered services.
//!
//! Services are keyed by name. Each machine entry carries a copy of the
//! machine record taken when it was first assigned, so the store can be
//! saved and reloaded without the live pool.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use cloudplace_core::{ByStratum, Machine, MachineId, ServiceDefinition, ServiceName, Stratum};
use tracing::debug;

use crate::error::{StateError, StateResult};

/// Services per stratum on one machine.
pub type StratumServices = ByStratum<Vec<ServiceName>>;

/// Machines per stratum for one service, one entry per placed unit.
pub type ServicePlacements = ByStratum<Vec<Machine>>;

/// Everything placed on one machine.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineAssignments {
    pub machine: Machine,
    pub services: StratumServices,
}

impl MachineAssignments {
    fn new(machine: Machine) -> Self {
        Self {
            machine,
            services: StratumServices::default(),
        }
    }

    fn pairs(&self) -> HashSet<(Stratum, &str)> {
        self.services
            .iter()
            .flat_map(|(stratum, names)| names.iter().map(move |n| (stratum, n.as_str())))
            .collect()
    }
}

/// In-memory assignment mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentStore {
    entries: BTreeMap<MachineId, MachineAssignments>,
}

impl AssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mutation ───────────────────────────────────────────────────

    /// Place `service` on `machine` under `stratum`.
    ///
    /// A service that does not allow multiple units is first removed from
    /// every machine and stratum, so it ends up in exactly one place.
    pub fn assign(&mut self, machine: &Machine, service: &ServiceDefinition, stratum: Stratum) {
        if !service.allow_multi_units {
            let removed = self.purge(&service.name);
            if removed > 0 {
                debug!(service = %service.name, removed, "moved single-unit service");
            }
        }

        self.entries
            .entry(machine.instance_id.clone())
            .or_insert_with(|| MachineAssignments::new(machine.clone()))
            .services
            .get_mut(stratum)
            .push(service.name.clone());

        debug!(
            machine = %machine.instance_id,
            service = %service.name,
            %stratum,
            "assigned"
        );
    }

    /// Make sure `machine` has an entry, even with nothing on it.
    pub fn ensure_machine(&mut self, machine: &Machine) {
        self.entries
            .entry(machine.instance_id.clone())
            .or_insert_with(|| MachineAssignments::new(machine.clone()));
    }

    /// Remove one unit of `service` from a machine.
    ///
    /// The unit is taken from the first stratum, in declaration order
    /// (BareMetal, LXC, KVM), that holds the service.
    pub fn remove_one(&mut self, machine_id: &str, service: &str) -> StateResult<Stratum> {
        let entry = self
            .entries
            .get_mut(machine_id)
            .ok_or_else(|| not_assigned(machine_id, service))?;

        for stratum in Stratum::ALL {
            let names = entry.services.get_mut(stratum);
            if let Some(pos) = names.iter().position(|n| n == service) {
                names.remove(pos);
                debug!(machine = machine_id, service, %stratum, "removed one unit");
                return Ok(stratum);
            }
        }

        Err(not_assigned(machine_id, service))
    }

    /// Remove every unit of `service` from a machine. Returns how many went.
    pub fn remove_all(&mut self, machine_id: &str, service: &str) -> StateResult<usize> {
        let entry = self
            .entries
            .get_mut(machine_id)
            .ok_or_else(|| not_assigned(machine_id, service))?;

        let mut removed = 0;
        for stratum in Stratum::ALL {
            let names = entry.services.get_mut(stratum);
            let before = names.len();
            names.retain(|n| n != service);
            removed += before - names.len();
        }

        if removed == 0 {
            return Err(not_assigned(machine_id, service));
        }
        debug!(machine = machine_id, service, removed, "removed all units");
        Ok(removed)
    }

    /// Drop a machine's entry entirely, returning what it held.
    pub fn clear_machine(&mut self, machine_id: &str) -> StateResult<MachineAssignments> {
        let entry = self
            .entries
            .remove(machine_id)
            .ok_or_else(|| StateError::MachineNotFound(machine_id.to_string()))?;
        debug!(machine = machine_id, "cleared machine");
        Ok(entry)
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        debug!("cleared all assignments");
    }

    /// Swap in a whole new mapping at once.
    pub fn replace_all(&mut self, other: AssignmentStore) {
        self.entries = other.entries;
        debug!(machines = self.entries.len(), "replaced all assignments");
    }

    /// Append everything in `other` to this store, machine by machine.
    pub fn merge(&mut self, other: AssignmentStore) {
        for (id, incoming) in other.entries {
            let entry = self
                .entries
                .entry(id)
                .or_insert_with(|| MachineAssignments::new(incoming.machine.clone()));
            for (stratum, names) in incoming.services.iter() {
                entry.services.get_mut(stratum).extend(names.iter().cloned());
            }
        }
    }

    /// Remove a service from everywhere. Returns how many units went.
    fn purge(&mut self, service: &str) -> usize {
        let mut removed = 0;
        for entry in self.entries.values_mut() {
            for stratum in Stratum::ALL {
                let names = entry.services.get_mut(stratum);
                let before = names.len();
                names.retain(|n| n != service);
                removed += before - names.len();
            }
        }
        removed
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Services on a machine, per stratum. Unknown machines read as empty.
    pub fn assignments_for_machine(&self, machine_id: &str) -> StratumServices {
        self.entries
            .get(machine_id)
            .map(|e| e.services.clone())
            .unwrap_or_default()
    }

    /// Machines hosting `service`, per stratum, by scanning every entry.
    pub fn machines_for_service(&self, service: &str) -> ServicePlacements {
        let mut placements = ServicePlacements::default();
        for entry in self.entries.values() {
            for (stratum, names) in entry.services.iter() {
                for _ in names.iter().filter(|n| n.as_str() == service) {
                    placements.get_mut(stratum).push(entry.machine.clone());
                }
            }
        }
        placements
    }

    /// Number of units of `service` across the store.
    pub fn unit_count(&self, service: &str) -> usize {
        self.entries
            .values()
            .flat_map(|e| e.services.iter().map(|(_, names)| names))
            .flatten()
            .filter(|n| n.as_str() == service)
            .count()
    }

    pub fn is_placed(&self, service: &str) -> bool {
        self.unit_count(service) > 0
    }

    /// Total services placed on a machine, across strata.
    pub fn machine_load(&self, machine_id: &str) -> usize {
        self.entries
            .get(machine_id)
            .map(|e| e.services.total())
            .unwrap_or(0)
    }

    /// The machine snapshot held for an entry.
    pub fn machine(&self, machine_id: &str) -> Option<&Machine> {
        self.entries.get(machine_id).map(|e| &e.machine)
    }

    /// Machines with at least one service assigned.
    pub fn machines_used(&self) -> Vec<&Machine> {
        self.entries
            .values()
            .filter(|e| !e.services.is_empty())
            .map(|e| &e.machine)
            .collect()
    }

    /// Names of every service with at least one unit.
    pub fn placed_service_names(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flat_map(|e| e.services.iter().map(|(_, names)| names))
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// All entries, ordered by machine ID.
    pub fn iter(&self) -> impl Iterator<Item = &MachineAssignments> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Same placements, ignoring order.
    ///
    /// For every machine in either store, the sets of (stratum, service)
    /// pairs must match. A machine missing on one side counts as empty.
    pub fn equivalent_to(&self, other: &AssignmentStore) -> bool {
        let empty = HashSet::new();
        let ids: BTreeSet<&MachineId> = self.entries.keys().chain(other.entries.keys()).collect();

        ids.into_iter().all(|id| {
            let mine = self.entries.get(id).map(MachineAssignments::pairs);
            let theirs = other.entries.get(id).map(MachineAssignments::pairs);
            mine.as_ref().unwrap_or(&empty) == theirs.as_ref().unwrap_or(&empty)
        })
    }
}

fn not_assigned(machine_id: &str, service: &str) -> StateError {
    StateError::AssignmentNotFound {
        machine: machine_id.to_string(),
        service: service.to_string(),
    }
}
