//! Service catalog — the enabled set of service definitions.
//!
//! The catalog is built once at startup from a TOML list of `[[services]]`
//! and then passed around by reference. Order is preserved; default
//! placement depends on it.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::types::ServiceDefinition;

/// The optional object-storage pair, included only when storage is enabled.
pub const STORAGE_SERVICES: [&str; 2] = ["swift-proxy", "swift-storage"];

const BUILTIN_CATALOG: &str = include_str!("../catalog.toml");

/// Switches that affect catalog membership.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogOptions {
    pub enable_storage: bool,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    services: Vec<ServiceDefinition>,
}

/// Immutable, ordered set of enabled services.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: Vec<ServiceDefinition>,
}

impl ServiceCatalog {
    /// Wrap an already-filtered list as-is.
    pub fn new(services: Vec<ServiceDefinition>) -> Self {
        Self { services }
    }

    /// Select the enabled services out of every known definition.
    ///
    /// Disabled and optional entries are dropped; the storage pair is then
    /// appended (in definition order) when `enable_storage` is set.
    pub fn enabled(all: Vec<ServiceDefinition>, options: CatalogOptions) -> Self {
        let (mut services, rest): (Vec<_>, Vec<_>) = all
            .into_iter()
            .partition(|s| !s.optional && !s.disabled);

        if options.enable_storage {
            services.extend(
                rest.into_iter()
                    .filter(|s| STORAGE_SERVICES.contains(&s.name.as_str())),
            );
        }

        debug!(count = services.len(), enable_storage = options.enable_storage, "catalog built");
        Self { services }
    }

    /// The catalog shipped with the crate.
    pub fn builtin(options: CatalogOptions) -> anyhow::Result<Self> {
        Self::from_toml(BUILTIN_CATALOG, options)
    }

    /// Load a catalog from a TOML file of `[[services]]`.
    pub fn from_file(path: &Path, options: CatalogOptions) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content, options)
    }

    pub fn from_toml(content: &str, options: CatalogOptions) -> anyhow::Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        Ok(Self::enabled(file.services, options))
    }

    pub fn list_enabled_services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDefinition> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
