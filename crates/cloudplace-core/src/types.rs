//! Domain types shared across cloudplace crates.
//!
//! A [`Machine`] is a placement target, a [`ServiceDefinition`] is a catalog
//! entry (a charm), and a [`Stratum`] says how a service sits on a machine.
//! Constraints are flat `dimension -> value` maps used both to describe a
//! machine's hardware and to filter machines for a service.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier of a machine (the provisioning instance ID).
pub type MachineId = String;

/// Canonical key of a service: its catalog `name`.
pub type ServiceName = String;

/// Value that matches anything, on either side of a comparison.
pub const WILDCARD: &str = "*";

// ── Stratum ───────────────────────────────────────────────────────

/// How a service instance is hosted on a machine.
///
/// Documents spell these `BareMetal`, `LXC` and `KVM`; see [`Stratum::as_str`]
/// and the [`FromStr`] impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stratum {
    BareMetal,
    Lxc,
    Kvm,
}

impl Stratum {
    /// All strata in declaration order.
    pub const ALL: [Stratum; 3] = [Stratum::BareMetal, Stratum::Lxc, Stratum::Kvm];

    /// Name used in persisted documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stratum::BareMetal => "BareMetal",
            Stratum::Lxc => "LXC",
            Stratum::Kvm => "KVM",
        }
    }
}

impl fmt::Display for Stratum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown placement stratum: {0}")]
pub struct ParseStratumError(pub String);

impl FromStr for Stratum {
    type Err = ParseStratumError;

    /// Accepts the document names (`BareMetal`, `LXC`, `KVM`) and the
    /// lowercase CLI spellings (`bare-metal`, `lxc`, `kvm`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BareMetal" | "bare-metal" | "baremetal" => Ok(Stratum::BareMetal),
            "LXC" | "lxc" => Ok(Stratum::Lxc),
            "KVM" | "kvm" => Ok(Stratum::Kvm),
            other => Err(ParseStratumError(other.to_string())),
        }
    }
}

/// One value per stratum. Every stratum is always present, so lookups never
/// miss.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ByStratum<T> {
    bare_metal: T,
    lxc: T,
    kvm: T,
}

impl<T> ByStratum<T> {
    pub fn get(&self, stratum: Stratum) -> &T {
        match stratum {
            Stratum::BareMetal => &self.bare_metal,
            Stratum::Lxc => &self.lxc,
            Stratum::Kvm => &self.kvm,
        }
    }

    pub fn get_mut(&mut self, stratum: Stratum) -> &mut T {
        match stratum {
            Stratum::BareMetal => &mut self.bare_metal,
            Stratum::Lxc => &mut self.lxc,
            Stratum::Kvm => &mut self.kvm,
        }
    }

    /// Iterate in stratum declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Stratum, &T)> {
        Stratum::ALL.into_iter().map(move |s| (s, self.get(s)))
    }
}

impl<E> ByStratum<Vec<E>> {
    /// True when no stratum holds anything.
    pub fn is_empty(&self) -> bool {
        self.bare_metal.is_empty() && self.lxc.is_empty() && self.kvm.is_empty()
    }

    /// Total number of entries across all strata.
    pub fn total(&self) -> usize {
        self.bare_metal.len() + self.lxc.len() + self.kvm.len()
    }
}

impl<T> std::ops::Index<Stratum> for ByStratum<T> {
    type Output = T;

    fn index(&self, stratum: Stratum) -> &T {
        self.get(stratum)
    }
}

// ── Constraints ───────────────────────────────────────────────────

/// Dimensions compared as quantities (machine value must be at least the
/// required value). Everything else compares by text.
pub const NUMERIC_DIMENSIONS: &[&str] = &["cpu_cores", "cpu_power", "mem", "storage", "root-disk"];

/// A single constraint value as it appears in config or persisted documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    Integer(u64),
    Float(f64),
    Text(String),
}

impl ConstraintValue {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, ConstraintValue::Text(s) if s == WILDCARD)
    }

    /// Numeric reading of the value. Text may carry a size suffix
    /// (`M`, `G`, `T`, `P`), with megabytes as the base unit.
    pub fn quantity(&self) -> Option<f64> {
        match self {
            ConstraintValue::Integer(n) => Some(*n as f64),
            ConstraintValue::Float(f) => Some(*f),
            ConstraintValue::Text(s) => parse_quantity(s),
        }
    }
}

fn parse_quantity(s: &str) -> Option<f64> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => {
            let multiplier = match c.to_ascii_uppercase() {
                'M' => 1.0,
                'G' => 1024.0,
                'T' => 1024.0 * 1024.0,
                'P' => 1024.0 * 1024.0 * 1024.0,
                _ => return None,
            };
            (&s[..idx], multiplier)
        }
        _ => (s, 1.0),
    };
    digits.parse::<f64>().ok().map(|n| n * multiplier)
}

impl fmt::Display for ConstraintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintValue::Integer(n) => write!(f, "{n}"),
            ConstraintValue::Float(x) => write!(f, "{x}"),
            ConstraintValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ConstraintValue {
    fn from(n: u64) -> Self {
        ConstraintValue::Integer(n)
    }
}

impl From<&str> for ConstraintValue {
    fn from(s: &str) -> Self {
        ConstraintValue::Text(s.to_string())
    }
}

/// Flat `dimension -> value` mapping, kept sorted for stable output.
pub type Constraints = BTreeMap<String, ConstraintValue>;

/// Render a constraint pair for display, e.g. `mem=4G`.
pub fn format_constraint(key: &str, value: &ConstraintValue) -> String {
    format!("{key}={value}")
}

// ── Machine ───────────────────────────────────────────────────────

/// Where a machine record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineKind {
    /// Backed by the provisioning pool.
    #[default]
    Live,
    /// Rebuilt from a persisted record the live pool could not resolve.
    Placeholder,
}

/// A placement target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub instance_id: MachineId,
    pub hostname: String,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub kind: MachineKind,
}

impl Machine {
    pub fn new(instance_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            hostname: hostname.into(),
            constraints: Constraints::new(),
            kind: MachineKind::Live,
        }
    }

    /// Builder-style constraint setter.
    pub fn with_constraint(mut self, key: &str, value: impl Into<ConstraintValue>) -> Self {
        self.constraints.insert(key.to_string(), value.into());
        self
    }

    /// Materialize a machine from a persisted snapshot.
    pub fn placeholder(
        instance_id: impl Into<String>,
        hostname: impl Into<String>,
        constraints: Constraints,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            hostname: hostname.into(),
            constraints,
            kind: MachineKind::Placeholder,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == MachineKind::Placeholder
    }

    /// Display string for one hardware dimension. Placeholders report the
    /// wildcard for anything they have no snapshot of.
    pub fn dimension(&self, key: &str) -> String {
        match self.constraints.get(key) {
            Some(v) => v.to_string(),
            None if self.is_placeholder() => WILDCARD.to_string(),
            None => "?".to_string(),
        }
    }

    /// Hostname plus hardware summary, used for substring filtering.
    pub fn filter_label(&self) -> String {
        format!(
            "{} arch:{} cores:{} mem:{} storage:{}",
            self.hostname,
            self.dimension("arch"),
            self.dimension("cpu_cores"),
            self.dimension("mem"),
            self.dimension("storage"),
        )
    }
}

// ── Service ───────────────────────────────────────────────────────

/// Whether a service must be placed before deployment can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceClass {
    /// Always required.
    #[default]
    Core,
    /// Never required.
    Optional,
    /// Required until it has been placed once.
    Compute,
}

fn default_deploy_priority() -> u32 {
    100
}

/// Immutable catalog entry for a deployable service (a charm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: ServiceName,
    pub display_name: String,
    /// Filter a machine must satisfy to host this service.
    #[serde(default)]
    pub constraints: Constraints,
    /// May be placed more than once at the same time.
    #[serde(default)]
    pub allow_multi_units: bool,
    /// Needs a dedicated machine.
    #[serde(default)]
    pub isolate: bool,
    /// Left out of the catalog unless explicitly enabled.
    #[serde(default)]
    pub optional: bool,
    /// Never part of the catalog.
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub class: ServiceClass,
    /// Lower deploys first.
    #[serde(default = "default_deploy_priority")]
    pub deploy_priority: u32,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            constraints: Constraints::new(),
            allow_multi_units: false,
            isolate: false,
            optional: false,
            disabled: false,
            class: ServiceClass::Core,
            deploy_priority: default_deploy_priority(),
        }
    }
}
