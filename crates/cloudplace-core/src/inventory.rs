//! Machine inventory seam.
//!
//! The provisioning client that discovers machines lives outside the engine.
//! The engine only needs a snapshot of the live pool, in a stable order.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::Machine;

/// Source of live machines.
pub trait MachineInventory {
    /// Current machine pool, in the order default placement should try them.
    fn list_machines(&self) -> Vec<Machine>;

    /// Look up a live machine by instance ID.
    fn find(&self, instance_id: &str) -> Option<Machine> {
        self.list_machines()
            .into_iter()
            .find(|m| m.instance_id == instance_id)
    }
}

impl MachineInventory for Vec<Machine> {
    fn list_machines(&self) -> Vec<Machine> {
        self.clone()
    }
}

/// Static inventory read from a TOML file of `[[machines]]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryFile {
    #[serde(default)]
    pub machines: Vec<Machine>,
}

impl InventoryFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let inventory: InventoryFile = toml::from_str(&content)?;
        Ok(inventory)
    }
}

impl MachineInventory for InventoryFile {
    fn list_machines(&self) -> Vec<Machine> {
        self.machines.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConstraintValue, MachineKind};

    #[test]
    fn parse_inventory_file() {
        let inventory: InventoryFile = toml::from_str(
            r#"
[[machines]]
instance_id = "/MAAS/api/1.0/nodes/node-1/"
hostname = "node-1.maas"

[machines.constraints]
arch = "amd64"
cpu_cores = 4
mem = 8192

[[machines]]
instance_id = "/MAAS/api/1.0/nodes/node-2/"
hostname = "node-2.maas"
"#,
        )
        .unwrap();

        let machines = inventory.list_machines();
        assert_eq!(machines.len(), 2);
        assert_eq!(machines[0].kind, MachineKind::Live);
        assert_eq!(
            machines[0].constraints.get("cpu_cores"),
            Some(&ConstraintValue::Integer(4))
        );
        assert!(machines[1].constraints.is_empty());
    }

    #[test]
    fn find_by_instance_id() {
        let pool = vec![Machine::new("a", "host-a"), Machine::new("b", "host-b")];
        assert_eq!(pool.find("b").map(|m| m.hostname), Some("host-b".to_string()));
        assert!(pool.find("c").is_none());
    }
}
