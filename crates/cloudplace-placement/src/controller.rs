//! PlacementController — editable placement state for one session.
//!
//! The controller owns the assignment store and keeps the unplaced set in
//! step with it:
//! - Every mutation recomputes the unplaced set before returning
//! - Every mutation autosaves when an autosave path is set
//! - Service names are checked against the catalog on the way in

use std::collections::HashSet;
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use cloudplace_core::{
    Constraints, InstallMode, Machine, MachineInventory, ServiceCatalog, ServiceClass,
    ServiceDefinition, ServiceName, Stratum,
};
use cloudplace_state::{AssignmentStore, ServicePlacements, StratumServices};
use tracing::{debug, error, info, warn};

use crate::codec::{self, LoadReport};
use crate::defaults::{generate_defaults, generate_single};
use crate::error::{PlacementError, PlacementResult};
use crate::matcher::is_satisfied;

/// Message returned when autoplace leaves services behind.
pub const NOT_ENOUGH_MACHINES: &str = "Not enough empty machines could be found for the \
     required services. Please add machines or finish placement manually.";

/// Result of [`PlacementController::autoplace_unplaced`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoplaceOutcome {
    /// Every service ended up placed.
    pub success: bool,
    /// Empty on success.
    pub message: String,
}

/// Placement state for a catalog over a machine pool.
pub struct PlacementController {
    catalog: ServiceCatalog,
    inventory: Box<dyn MachineInventory>,
    mode: InstallMode,
    store: AssignmentStore,
    /// Catalog services with no units, in catalog order.
    unplaced: Vec<ServiceName>,
    /// Compute services seen placed at least once. Never shrinks.
    placed_compute: HashSet<ServiceName>,
    autosave_path: Option<PathBuf>,
}

impl PlacementController {
    pub fn new(catalog: ServiceCatalog, inventory: impl MachineInventory + 'static) -> Self {
        let mut controller = Self {
            catalog,
            inventory: Box::new(inventory),
            mode: InstallMode::default(),
            store: AssignmentStore::new(),
            unplaced: Vec::new(),
            placed_compute: HashSet::new(),
            autosave_path: None,
        };
        controller.reset_unplaced();
        controller
    }

    /// Builder-style install mode, used by default generation and autoplace.
    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> InstallMode {
        self.mode
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &AssignmentStore {
        &self.store
    }

    /// The live machine pool.
    pub fn machines(&self) -> Vec<Machine> {
        self.inventory.list_machines()
    }

    /// Resolve a machine by instance ID: live pool first, then the
    /// snapshots held by the store.
    pub fn find_machine(&self, instance_id: &str) -> PlacementResult<Machine> {
        self.inventory
            .find(instance_id)
            .or_else(|| self.store.machine(instance_id).cloned())
            .ok_or_else(|| PlacementError::MachineNotFound(instance_id.to_string()))
    }

    fn service(&self, name: &str) -> PlacementResult<&ServiceDefinition> {
        self.catalog
            .get(name)
            .ok_or_else(|| PlacementError::ServiceNotFound(name.to_string()))
    }

    // ── Mutation ───────────────────────────────────────────────────

    /// Place a catalog service on `machine` under `stratum`.
    pub fn assign(&mut self, machine: &Machine, service: &str, stratum: Stratum) -> PlacementResult<()> {
        let definition = self.service(service)?.clone();
        self.store.assign(machine, &definition, stratum);
        self.changed();
        Ok(())
    }

    /// Remove one unit of `service` from a machine; see
    /// [`AssignmentStore::remove_one`] for which stratum loses it.
    pub fn remove_one_assignment(&mut self, machine_id: &str, service: &str) -> PlacementResult<Stratum> {
        let stratum = self.store.remove_one(machine_id, service)?;
        self.changed();
        Ok(stratum)
    }

    pub fn remove_all_assignments(&mut self, machine_id: &str, service: &str) -> PlacementResult<usize> {
        let removed = self.store.remove_all(machine_id, service)?;
        self.changed();
        Ok(removed)
    }

    /// Remove `service` from every machine hosting it.
    pub fn clear_service(&mut self, service: &str) -> PlacementResult<usize> {
        self.service(service)?;
        let hosts: Vec<String> = self
            .store
            .iter()
            .filter(|e| e.services.iter().any(|(_, names)| names.iter().any(|n| n == service)))
            .map(|e| e.machine.instance_id.clone())
            .collect();

        let mut removed = 0;
        for id in hosts {
            removed += self.store.remove_all(&id, service)?;
        }
        self.changed();
        Ok(removed)
    }

    pub fn clear_assignments(&mut self, machine_id: &str) -> PlacementResult<()> {
        self.store.clear_machine(machine_id)?;
        self.changed();
        Ok(())
    }

    pub fn clear_all_assignments(&mut self) {
        self.store.clear_all();
        self.changed();
    }

    pub fn set_all_assignments(&mut self, assignments: AssignmentStore) {
        self.store.replace_all(assignments);
        self.changed();
    }

    /// Discard current assignments in favour of freshly generated defaults.
    pub fn reset_to_defaults(&mut self) {
        let defaults = self.gen_defaults();
        self.set_all_assignments(defaults);
    }

    /// Place whatever is unplaced onto machines that hold nothing yet, or
    /// onto the controller in a single-machine install.
    ///
    /// Purely additive: existing assignments are left alone.
    pub fn autoplace_unplaced(&mut self) -> AutoplaceOutcome {
        let pending: Vec<&ServiceDefinition> = self
            .unplaced
            .iter()
            .filter_map(|name| self.catalog.get(name))
            .collect();

        let additions = match self.mode {
            InstallMode::Multi => {
                let empty_machines: Vec<Machine> = self
                    .machines()
                    .into_iter()
                    .filter(|m| self.store.machine_load(&m.instance_id) == 0)
                    .collect();
                generate_defaults(pending, &empty_machines)
            }
            InstallMode::Single => generate_single(pending),
        };
        self.store.merge(additions);
        self.changed();

        if self.unplaced.is_empty() {
            info!("autoplace placed every service");
            AutoplaceOutcome {
                success: true,
                message: String::new(),
            }
        } else {
            warn!(remaining = self.unplaced.len(), "autoplace left services unplaced");
            AutoplaceOutcome {
                success: false,
                message: NOT_ENOUGH_MACHINES.to_string(),
            }
        }
    }

    /// Post-mutation bookkeeping.
    fn changed(&mut self) {
        self.reset_unplaced();
        if let Err(err) = self.do_autosave() {
            error!(%err, "autosave failed");
        }
    }

    // ── Unplaced tracking ──────────────────────────────────────────

    /// Recompute the unplaced set from the store.
    pub fn reset_unplaced(&mut self) {
        self.unplaced.clear();
        for service in self.catalog.iter() {
            if self.store.machines_for_service(&service.name).is_empty() {
                self.unplaced.push(service.name.clone());
            } else if service.class == ServiceClass::Compute
                && self.placed_compute.insert(service.name.clone())
            {
                debug!(service = %service.name, "compute service no longer required");
            }
        }
        debug!(unplaced = self.unplaced.len(), "unplaced services recomputed");
    }

    /// Catalog services with no units anywhere, in catalog order.
    pub fn unplaced_services(&self) -> Vec<&ServiceDefinition> {
        self.unplaced
            .iter()
            .filter_map(|name| self.catalog.get(name))
            .collect()
    }

    /// Whether deployment is blocked until `service` is placed.
    ///
    /// A compute service stops being required the first time it is seen
    /// placed, and stays that way even if it is later unassigned.
    pub fn service_is_core(&self, service: &ServiceDefinition) -> bool {
        match service.class {
            ServiceClass::Core => true,
            ServiceClass::Optional => false,
            ServiceClass::Compute => !self.placed_compute.contains(&service.name),
        }
    }

    /// True when no unplaced service is core.
    pub fn can_deploy(&self) -> bool {
        self.unplaced_services()
            .into_iter()
            .all(|s| !self.service_is_core(s))
    }

    /// Whether a session should stop for manual placement.
    pub fn needs_review(&self, edit_placement: bool) -> bool {
        edit_placement || !self.can_deploy()
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn assignments_for_machine(&self, machine_id: &str) -> StratumServices {
        self.store.assignments_for_machine(machine_id)
    }

    pub fn machines_for_service(&self, service: &str) -> ServicePlacements {
        self.store.machines_for_service(service)
    }

    /// Live machines whose filter label contains `filter`, optionally
    /// restricted to those satisfying `constraints`.
    pub fn filter_machines(&self, filter: &str, constraints: Option<&Constraints>) -> Vec<Machine> {
        self.machines()
            .into_iter()
            .filter(|m| m.filter_label().contains(filter))
            .filter(|m| constraints.is_none_or(|c| is_satisfied(m, c)))
            .collect()
    }

    /// Machines hosting at least one service.
    pub fn machines_used(&self) -> Vec<&Machine> {
        self.store.machines_used()
    }

    /// Placed catalog services, in deploy order.
    pub fn placed_services(&self) -> Vec<&ServiceDefinition> {
        let placed = self.store.placed_service_names();
        let mut services: Vec<&ServiceDefinition> = self
            .catalog
            .iter()
            .filter(|s| placed.contains(s.name.as_str()))
            .collect();
        services.sort_by_key(|s| s.deploy_priority);
        services
    }

    /// Default assignments for the whole catalog: over the live pool for a
    /// multi-machine install, on the controller for a single one. Does not
    /// touch controller state.
    pub fn gen_defaults(&self) -> AssignmentStore {
        match self.mode {
            InstallMode::Multi => generate_defaults(self.catalog.iter(), &self.machines()),
            InstallMode::Single => generate_single(self.catalog.iter()),
        }
    }

    pub fn are_assignments_equivalent(&self, other: &AssignmentStore) -> bool {
        self.store.equivalent_to(other)
    }

    /// Whether the current assignments match what defaults would produce.
    pub fn is_default(&self) -> bool {
        self.are_assignments_equivalent(&self.gen_defaults())
    }

    // ── Persistence ────────────────────────────────────────────────

    pub fn save<W: Write>(&self, writer: W) -> PlacementResult<()> {
        codec::save(&self.store, self.inventory.as_ref(), writer)
    }

    /// Replace the current assignments with a saved document. On error the
    /// current assignments are untouched.
    pub fn load<R: Read>(&mut self, reader: R) -> PlacementResult<LoadReport> {
        let (store, report) = codec::load(reader, &self.catalog, self.inventory.as_ref())?;
        self.set_all_assignments(store);
        Ok(report)
    }

    pub fn load_file(&mut self, path: &Path) -> PlacementResult<LoadReport> {
        let file = fs::File::open(path)?;
        self.load(BufReader::new(file))
    }

    /// Write to `path` via a temporary file in the same directory, renamed
    /// into place. The temporary file is removed if writing fails.
    pub fn save_file(&self, path: &Path) -> PlacementResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            self.save(&mut writer)?;
            writer.flush()?;
        }
        tmp.persist(path).map_err(|err| err.error)?;
        debug!(path = %path.display(), "placements written");
        Ok(())
    }

    pub fn set_autosave_path(&mut self, path: impl Into<PathBuf>) {
        self.autosave_path = Some(path.into());
    }

    /// Save to the autosave path, if one is set.
    pub fn do_autosave(&self) -> PlacementResult<()> {
        match &self.autosave_path {
            Some(path) => self.save_file(path),
            None => Ok(()),
        }
    }

    /// Session start: load saved placements if present, else install
    /// defaults. Autosaving starts afterwards either way.
    pub fn initialize(&mut self, placements_path: &Path) -> PlacementResult<Option<LoadReport>> {
        let report = if placements_path.exists() {
            let report = self.load_file(placements_path)?;
            info!(path = %placements_path.display(), "loaded placements from file");
            Some(report)
        } else {
            self.reset_to_defaults();
            info!("no saved placements, using defaults");
            None
        };

        self.set_autosave_path(placements_path);
        self.do_autosave()?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::SINGLE_CONTROLLER_ID;
    use cloudplace_core::{CatalogOptions, ConstraintValue};

    fn service(name: &str) -> ServiceDefinition {
        ServiceDefinition::new(name, name)
    }

    fn compute() -> ServiceDefinition {
        let mut svc = service("nova-compute");
        svc.allow_multi_units = true;
        svc.isolate = true;
        svc.class = ServiceClass::Compute;
        svc
    }

    fn gui() -> ServiceDefinition {
        let mut svc = service("juju-gui");
        svc.class = ServiceClass::Optional;
        svc
    }

    fn machine(id: &str) -> Machine {
        Machine::new(id, format!("{id}.maas"))
    }

    fn pool() -> Vec<Machine> {
        vec![machine("fake-instance-id-1"), machine("fake-instance-id-2")]
    }

    fn controller() -> PlacementController {
        let catalog = ServiceCatalog::new(vec![compute(), service("keystone"), gui()]);
        PlacementController::new(catalog, pool())
    }

    fn arch_catalog() -> ServiceCatalog {
        let mut a = service("a");
        a.isolate = true;
        a.constraints.insert("arch".to_string(), ConstraintValue::from("arm64"));
        ServiceCatalog::new(vec![a, service("b")])
    }

    // ── Assign / remove ────────────────────────────────────────────

    #[test]
    fn assign_unknown_service_fails() {
        let mut pc = controller();
        let err = pc.assign(&machine("m1"), "ceph", Stratum::Lxc).unwrap_err();
        assert!(matches!(err, PlacementError::ServiceNotFound(_)));
        assert!(pc.store().is_empty());
    }

    #[test]
    fn assign_single_unit_elsewhere_keeps_one() {
        let mut pc = controller();
        let (m1, m2) = (machine("m1"), machine("m2"));
        pc.assign(&m1, "keystone", Stratum::Lxc).unwrap();
        pc.assign(&m2, "keystone", Stratum::Kvm).unwrap();

        let placements = pc.machines_for_service("keystone");
        assert_eq!(placements.total(), 1);
        assert_eq!(placements[Stratum::Kvm][0].instance_id, "m2");
    }

    #[test]
    fn remove_one_then_last() {
        let mut pc = controller();
        let m1 = machine("m1");
        pc.assign(&m1, "nova-compute", Stratum::Lxc).unwrap();
        pc.assign(&m1, "nova-compute", Stratum::Kvm).unwrap();

        pc.remove_one_assignment("m1", "nova-compute").unwrap();
        let left = pc.assignments_for_machine("m1");
        assert_eq!(left[Stratum::Lxc].len() + left[Stratum::Kvm].len(), 1);

        pc.remove_one_assignment("m1", "nova-compute").unwrap();
        assert!(pc.machines_for_service("nova-compute").is_empty());

        assert!(matches!(
            pc.remove_one_assignment("m1", "nova-compute"),
            Err(PlacementError::State(_))
        ));
    }

    #[test]
    fn clear_service_everywhere() {
        let mut pc = controller();
        pc.assign(&machine("m1"), "nova-compute", Stratum::Lxc).unwrap();
        pc.assign(&machine("m2"), "nova-compute", Stratum::BareMetal).unwrap();

        assert_eq!(pc.clear_service("nova-compute").unwrap(), 2);
        assert!(pc.machines_for_service("nova-compute").is_empty());
        assert!(pc.clear_service("ceph").is_err());
    }

    // ── Unplaced tracking ──────────────────────────────────────────

    #[test]
    fn reset_unplaced_none() {
        let mut pc = controller();
        let names: Vec<String> = pc.catalog().iter().map(|s| s.name.clone()).collect();
        for name in &names {
            pc.assign(&machine("m1"), name, Stratum::Lxc).unwrap();
        }
        assert!(pc.unplaced_services().is_empty());
        assert!(pc.can_deploy());
    }

    #[test]
    fn reset_unplaced_tracks_mutations() {
        let mut pc = controller();
        assert_eq!(pc.unplaced_services().len(), 3);

        pc.assign(&machine("m1"), "keystone", Stratum::Kvm).unwrap();
        let names: Vec<&str> = pc.unplaced_services().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["nova-compute", "juju-gui"]);

        pc.clear_all_assignments();
        assert_eq!(pc.unplaced_services().len(), 3);
    }

    #[test]
    fn service_is_core_sampling() {
        let mut pc = controller();
        assert!(pc.service_is_core(&service("keystone")));
        assert!(pc.service_is_core(&compute()));
        assert!(!pc.service_is_core(&gui()));

        pc.assign(&machine("m1"), "nova-compute", Stratum::Lxc).unwrap();
        assert!(!pc.service_is_core(&compute()));
        assert!(pc.service_is_core(&service("keystone")));
        assert!(!pc.service_is_core(&gui()));
    }

    #[test]
    fn compute_stays_non_core_after_removal() {
        let mut pc = controller();
        pc.assign(&machine("m1"), "nova-compute", Stratum::BareMetal).unwrap();
        pc.clear_assignments("m1").unwrap();

        assert!(!pc.service_is_core(&compute()));
        pc.assign(&machine("m2"), "keystone", Stratum::BareMetal).unwrap();
        // Compute and the GUI are unplaced, but neither is required.
        assert_eq!(pc.unplaced_services().len(), 2);
        assert!(pc.can_deploy());
    }

    #[test]
    fn can_deploy_blocked_by_core() {
        let mut pc = controller();
        assert!(!pc.can_deploy());
        assert!(pc.needs_review(false));

        pc.assign(&machine("m1"), "nova-compute", Stratum::BareMetal).unwrap();
        assert!(!pc.can_deploy());
        pc.assign(&machine("m1"), "keystone", Stratum::Lxc).unwrap();
        assert!(pc.can_deploy());
        assert!(!pc.needs_review(false));
        assert!(pc.needs_review(true));
    }

    // ── Defaults / autoplace ───────────────────────────────────────

    #[test]
    fn defaults_scenario_two_machines() {
        let pool = vec![
            machine("M1").with_constraint("arch", "arm64"),
            machine("M2").with_constraint("arch", "amd64"),
        ];
        let mut pc = PlacementController::new(arch_catalog(), pool);
        pc.reset_to_defaults();

        assert_eq!(pc.assignments_for_machine("M1")[Stratum::BareMetal], vec!["a".to_string()]);
        assert_eq!(pc.assignments_for_machine("M2")[Stratum::BareMetal], vec!["b".to_string()]);
        assert!(pc.unplaced_services().is_empty());
        assert!(pc.is_default());
    }

    #[test]
    fn defaults_scenario_one_machine() {
        let pool = vec![machine("M1").with_constraint("arch", "amd64")];
        let mut pc = PlacementController::new(arch_catalog(), pool);
        pc.reset_to_defaults();

        assert_eq!(pc.assignments_for_machine("M1")[Stratum::BareMetal], vec!["b".to_string()]);
        let unplaced: Vec<&str> = pc.unplaced_services().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(unplaced, vec!["a"]);
        assert!(!pc.can_deploy());
    }

    #[test]
    fn is_default_changes_after_edit() {
        let mut pc = controller();
        pc.reset_to_defaults();
        assert!(pc.is_default());

        pc.assign(&machine("fake-instance-id-2"), "juju-gui", Stratum::Kvm).unwrap();
        assert!(!pc.is_default());
    }

    #[test]
    fn autoplace_uses_only_empty_machines() {
        let mut pc = controller();
        pc.assign(&machine("fake-instance-id-1"), "keystone", Stratum::Lxc).unwrap();

        let outcome = pc.autoplace_unplaced();

        // nova-compute (isolated) takes the only empty machine, leaving no
        // controller machine for the GUI.
        assert!(!outcome.success);
        assert_eq!(outcome.message, NOT_ENOUGH_MACHINES);
        assert_eq!(
            pc.assignments_for_machine("fake-instance-id-2")[Stratum::BareMetal],
            vec!["nova-compute".to_string()]
        );
        assert_eq!(
            pc.assignments_for_machine("fake-instance-id-1")[Stratum::Lxc],
            vec!["keystone".to_string()]
        );
        let unplaced: Vec<&str> = pc.unplaced_services().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(unplaced, vec!["juju-gui"]);
    }

    #[test]
    fn autoplace_success() {
        let catalog = ServiceCatalog::new(vec![compute(), service("keystone")]);
        let mut pc = PlacementController::new(catalog, pool());

        let outcome = pc.autoplace_unplaced();

        assert!(outcome.success);
        assert!(outcome.message.is_empty());
        assert!(pc.unplaced_services().is_empty());
    }

    #[test]
    fn placed_services_in_deploy_order() {
        let mut late = service("late");
        late.deploy_priority = 900;
        let mut early = service("early");
        early.deploy_priority = 10;
        let catalog = ServiceCatalog::new(vec![late, service("unplaced"), early]);
        let mut pc = PlacementController::new(catalog, pool());
        pc.assign(&machine("m1"), "late", Stratum::Lxc).unwrap();
        pc.assign(&machine("m1"), "early", Stratum::Lxc).unwrap();

        let order: Vec<&str> = pc.placed_services().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(order, vec!["early", "late"]);
        assert_eq!(pc.machines_used().len(), 1);
    }

    #[test]
    fn filter_machines_by_label_and_constraints() {
        let pool = vec![
            machine("m1").with_constraint("arch", "arm64").with_constraint("mem", "8G"),
            machine("m2").with_constraint("arch", "amd64").with_constraint("mem", 2048u64),
        ];
        let pc = PlacementController::new(ServiceCatalog::default(), pool);

        let ids = |ms: Vec<Machine>| -> Vec<String> { ms.into_iter().map(|m| m.instance_id).collect() };
        assert_eq!(ids(pc.filter_machines("arch:arm64", None)), vec!["m1"]);
        assert_eq!(ids(pc.filter_machines("", None)), vec!["m1", "m2"]);

        let mut needs_mem = Constraints::new();
        needs_mem.insert("mem".to_string(), ConstraintValue::from("4G"));
        assert_eq!(ids(pc.filter_machines("maas", Some(&needs_mem))), vec!["m1"]);
    }

    #[test]
    fn single_mode_defaults_use_controller() {
        let mut pc = PlacementController::new(
            ServiceCatalog::new(vec![compute(), service("keystone"), gui()]),
            Vec::<Machine>::new(),
        )
        .with_mode(InstallMode::Single);
        pc.reset_to_defaults();

        let on_controller = pc.assignments_for_machine(SINGLE_CONTROLLER_ID);
        assert_eq!(on_controller[Stratum::Kvm], vec!["nova-compute".to_string()]);
        assert_eq!(
            on_controller[Stratum::Lxc],
            vec!["keystone".to_string(), "juju-gui".to_string()]
        );
        assert!(pc.unplaced_services().is_empty());
        assert!(pc.can_deploy());
        assert!(pc.is_default());

        pc.remove_one_assignment(SINGLE_CONTROLLER_ID, "keystone").unwrap();
        assert!(!pc.is_default());
        assert!(pc.autoplace_unplaced().success);
        assert!(pc.is_default());
    }

    #[test]
    fn single_mode_initialize_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("placements.yaml");

        let mut pc = controller().with_mode(InstallMode::Single);
        pc.initialize(&path).unwrap();

        let mut reloaded = controller().with_mode(InstallMode::Single);
        let report = reloaded.initialize(&path).unwrap().unwrap();
        assert_eq!(report.placeholders, 1);
        assert!(reloaded.is_default());
        assert!(reloaded.find_machine(SINGLE_CONTROLLER_ID).unwrap().is_placeholder());
    }

    // ── Persistence ────────────────────────────────────────────────

    #[test]
    fn autosave_failure_does_not_fail_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let mut pc = controller();
        pc.set_autosave_path(dir.path().join("missing").join("placements.yaml"));

        assert!(pc.do_autosave().is_err());
        let names: Vec<String> = pc.catalog().iter().map(|s| s.name.clone()).collect();
        for name in &names {
            assert!(pc.assign(&machine("m1"), name, Stratum::Lxc).is_ok());
        }
        assert!(pc.unplaced_services().is_empty());
        assert!(pc.can_deploy());
    }

    #[test]
    fn save_file_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut pc = controller();
        pc.reset_to_defaults();

        let path = dir.path().join("placements.tmp");
        pc.save_file(&path).unwrap();
        pc.save_file(&path).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let mut reloaded = controller();
        reloaded.load_file(&path).unwrap();
        assert!(reloaded.is_default());

        assert!(pc.save_file(&dir.path().join("missing").join("p.yaml")).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn persistence_round_trip() {
        let mut pc = controller();
        let m1 = machine("fake-instance-id-1");
        let m2 = machine("fake-instance-id-2").with_constraint("cpu", 8u64);
        pc.assign(&m1, "nova-compute", Stratum::Lxc).unwrap();
        pc.assign(&m2, "keystone", Stratum::Kvm).unwrap();

        let mut buf = Vec::new();
        pc.save(&mut buf).unwrap();

        let mut fresh = controller();
        fresh.load(buf.as_slice()).unwrap();

        assert!(fresh.are_assignments_equivalent(pc.store()));
        let used = |c: &PlacementController| -> Vec<String> {
            c.machines_used().iter().map(|m| m.instance_id.clone()).collect()
        };
        assert_eq!(used(&pc), used(&fresh));
        let placed = |c: &PlacementController| -> Vec<String> {
            c.placed_services().iter().map(|s| s.name.clone()).collect()
        };
        assert_eq!(placed(&pc), placed(&fresh));
    }

    #[test]
    fn failed_load_keeps_current_assignments() {
        let mut pc = controller();
        pc.assign(&machine("m1"), "keystone", Stratum::Lxc).unwrap();
        let before = pc.store().clone();

        assert!(pc.load("version: 9\nmachines: {}\n".as_bytes()).is_err());
        assert_eq!(pc.store(), &before);
    }

    #[test]
    fn find_machine_falls_back_to_snapshot() {
        let mut pc = controller();
        let ghost = machine("ghost");
        pc.assign(&ghost, "keystone", Stratum::Lxc).unwrap();

        assert_eq!(pc.find_machine("fake-instance-id-1").unwrap().hostname, "fake-instance-id-1.maas");
        assert_eq!(pc.find_machine("ghost").unwrap(), ghost);
        assert!(matches!(
            pc.find_machine("nowhere"),
            Err(PlacementError::MachineNotFound(_))
        ));
    }

    #[test]
    fn initialize_then_autosave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("placements.yaml");

        let mut pc = controller();
        assert!(pc.initialize(&path).unwrap().is_none());
        assert!(path.exists());
        assert!(pc.is_default());

        pc.clear_all_assignments();

        let mut reloaded = controller();
        let report = reloaded.initialize(&path).unwrap().unwrap();
        assert_eq!(report.machines, 0);
        assert!(reloaded.store().is_empty());
    }

    #[test]
    fn builtin_catalog_defaults_over_small_pool() {
        let catalog = ServiceCatalog::builtin(CatalogOptions::default()).unwrap();
        let pool = vec![
            machine("big-1").with_constraint("mem", "16G"),
            machine("big-2").with_constraint("mem", "16G"),
            machine("small").with_constraint("mem", 1024u64),
        ];
        let mut pc = PlacementController::new(catalog, pool);
        pc.reset_to_defaults();

        let on_big_1 = pc.assignments_for_machine("big-1");
        let on_big_2 = pc.assignments_for_machine("big-2");
        assert_eq!(on_big_1[Stratum::BareMetal], vec!["nova-compute".to_string()]);
        assert_eq!(on_big_2[Stratum::BareMetal], vec!["neutron-gateway".to_string()]);
        assert!(pc.assignments_for_machine("small")[Stratum::BareMetal].contains(&"keystone".to_string()));
        assert!(pc.can_deploy());
    }
}
