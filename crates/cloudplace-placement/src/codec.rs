//! YAML persistence for the assignment store.
//!
//! Document shape:
//!
//! ```yaml
//! version: 1
//! machines:
//!   <instance id>:
//!     hostname: node-1.maas
//!     constraints: { arch: amd64, cpu_cores: 4 }
//!     assignments:
//!       BareMetal: [nova-compute]
//!       LXC: [keystone, mysql]
//! ```
//!
//! Unversioned documents (machine IDs at the top level) load as version 1.
//!
//! Documents are written as YAML 1.2. Text constraint values such as `yes`,
//! `no`, `on` or `off` are emitted unquoted and read back here as text, but
//! a YAML 1.1 reader will take them for booleans. Tools exchanging documents
//! with a YAML 1.1 parser should not rely on such values staying strings.
//! Loading builds a fresh store and only hands it back once the whole
//! document has been read, so a bad document never leaves a half-filled
//! store behind.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

use cloudplace_core::{
    ByStratum, Constraints, Machine, MachineInventory, ServiceCatalog, ServiceName, Stratum,
};
use cloudplace_state::AssignmentStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PlacementError, PlacementResult};

/// Newest document version this crate reads and the one it writes.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PlacementDocument {
    version: u32,
    #[serde(default)]
    machines: BTreeMap<String, MachineRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MachineRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    #[serde(default)]
    constraints: Constraints,
    #[serde(default)]
    assignments: BTreeMap<String, Vec<ServiceName>>,
}

/// A service reference dropped during load.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedService {
    pub machine: String,
    pub service: String,
    pub reason: String,
}

/// What a load did besides filling the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub machines: usize,
    /// Machines the live pool could not resolve.
    pub placeholders: usize,
    pub skipped: Vec<SkippedService>,
}

// ── Save ──────────────────────────────────────────────────────────

/// Write `store` as YAML.
///
/// Constraint snapshots are taken now: from the live pool when it still
/// knows the machine, otherwise from the store's own copy.
pub fn save<W: Write>(
    store: &AssignmentStore,
    inventory: &dyn MachineInventory,
    writer: W,
) -> PlacementResult<()> {
    let live: HashMap<String, Machine> = inventory
        .list_machines()
        .into_iter()
        .map(|m| (m.instance_id.clone(), m))
        .collect();

    let mut machines = BTreeMap::new();
    for entry in store.iter() {
        let machine = live
            .get(&entry.machine.instance_id)
            .unwrap_or(&entry.machine);

        let assignments = entry
            .services
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(stratum, names)| (stratum.as_str().to_string(), names.clone()))
            .collect();

        machines.insert(
            machine.instance_id.clone(),
            MachineRecord {
                hostname: Some(machine.hostname.clone()),
                constraints: machine.constraints.clone(),
                assignments,
            },
        );
    }

    let document = PlacementDocument {
        version: DOCUMENT_VERSION,
        machines,
    };
    serde_yaml::to_writer(writer, &document)?;
    debug!(machines = document.machines.len(), "placements saved");
    Ok(())
}

// ── Load ──────────────────────────────────────────────────────────

fn parse_document<R: Read>(reader: R) -> PlacementResult<BTreeMap<String, MachineRecord>> {
    let value: serde_yaml::Value = serde_yaml::from_reader(reader)?;
    let versioned = matches!(&value, serde_yaml::Value::Mapping(map) if map.contains_key("version"));

    match value {
        serde_yaml::Value::Null => Ok(BTreeMap::new()),
        serde_yaml::Value::Mapping(_) if versioned => {
            let document: PlacementDocument = serde_yaml::from_value(value)?;
            if document.version > DOCUMENT_VERSION {
                return Err(PlacementError::UnsupportedVersion {
                    found: document.version,
                    supported: DOCUMENT_VERSION,
                });
            }
            Ok(document.machines)
        }
        serde_yaml::Value::Mapping(_) => Ok(serde_yaml::from_value(value)?),
        other => Err(PlacementError::Malformed(format!(
            "expected a mapping at the top level, found {}",
            yaml_kind(&other)
        ))),
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

fn parse_strata(
    machine_id: &str,
    raw: BTreeMap<String, Vec<ServiceName>>,
) -> PlacementResult<ByStratum<Vec<ServiceName>>> {
    let mut strata = ByStratum::<Vec<ServiceName>>::default();
    for (name, services) in raw {
        let stratum: Stratum = name
            .parse()
            .map_err(|_| PlacementError::UnknownStratum(format!("{name} (machine {machine_id})")))?;
        strata.get_mut(stratum).extend(services);
    }
    Ok(strata)
}

/// Read a YAML document into a new store.
///
/// Machines the live pool knows are taken from it; the rest become
/// placeholders built from the saved snapshot. Service names the catalog
/// does not know are skipped with a warning, as are repeat references to a
/// single-unit service (the first one wins).
pub fn load<R: Read>(
    reader: R,
    catalog: &ServiceCatalog,
    inventory: &dyn MachineInventory,
) -> PlacementResult<(AssignmentStore, LoadReport)> {
    let records = parse_document(reader)?;

    let mut live: HashMap<String, Machine> = inventory
        .list_machines()
        .into_iter()
        .map(|m| (m.instance_id.clone(), m))
        .collect();

    // Validate every stratum name before touching anything.
    let mut parsed = Vec::with_capacity(records.len());
    for (id, record) in records {
        let strata = parse_strata(&id, record.assignments)?;
        parsed.push((id, record.hostname, record.constraints, strata));
    }

    let mut store = AssignmentStore::new();
    let mut report = LoadReport::default();

    for (id, hostname, constraints, strata) in parsed {
        let machine = match live.remove(&id) {
            Some(machine) => machine,
            None => {
                report.placeholders += 1;
                let hostname = hostname.unwrap_or_else(|| id.clone());
                Machine::placeholder(id.clone(), hostname, constraints)
            }
        };
        store.ensure_machine(&machine);
        report.machines += 1;

        for (stratum, names) in strata.iter() {
            for name in names {
                let Some(service) = catalog.get(name) else {
                    warn!(machine = %id, service = %name, "skipping unknown service");
                    report.skipped.push(SkippedService {
                        machine: id.clone(),
                        service: name.clone(),
                        reason: "not in catalog".to_string(),
                    });
                    continue;
                };

                if !service.allow_multi_units && store.is_placed(name) {
                    warn!(machine = %id, service = %name, "skipping repeat of single-unit service");
                    report.skipped.push(SkippedService {
                        machine: id.clone(),
                        service: name.clone(),
                        reason: "single-unit service already placed".to_string(),
                    });
                    continue;
                }

                store.assign(&machine, service, stratum);
            }
        }
    }

    info!(
        machines = report.machines,
        placeholders = report.placeholders,
        skipped = report.skipped.len(),
        "placements loaded"
    );
    Ok((store, report))
}
