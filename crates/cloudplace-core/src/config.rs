//! cloudplace.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogOptions, ServiceCatalog};
use crate::inventory::InventoryFile;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default)]
    pub placement: PlacementSection,
    #[serde(default)]
    pub inventory: InventorySection,
    #[serde(default)]
    pub catalog: CatalogSection,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// How many machines the install targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Services spread over the machine pool.
    #[default]
    Multi,
    /// Everything on one controller machine, in containers and guests.
    Single,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementSection {
    #[serde(default)]
    pub mode: InstallMode,
    #[serde(default = "default_placements_file")]
    pub placements_file: PathBuf,
    #[serde(default)]
    pub enable_storage: bool,
    #[serde(default)]
    pub edit_placement: bool,
}

impl Default for PlacementSection {
    fn default() -> Self {
        Self {
            mode: InstallMode::default(),
            placements_file: default_placements_file(),
            enable_storage: false,
            edit_placement: false,
        }
    }
}

fn default_placements_file() -> PathBuf {
    PathBuf::from("placements.yaml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySection {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSection {
    pub file: Option<PathBuf>,
}

impl PlacementConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: PlacementConfig = toml::from_str(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Read the config if it exists, otherwise fall back to defaults rooted
    /// at the current directory.
    pub fn from_file_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn placements_path(&self) -> PathBuf {
        self.resolve(&self.placement.placements_file)
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            enable_storage: self.placement.enable_storage,
        }
    }

    /// The enabled catalog: from `[catalog].file` when set, else built-in.
    pub fn load_catalog(&self) -> anyhow::Result<ServiceCatalog> {
        match &self.catalog.file {
            Some(file) => ServiceCatalog::from_file(&self.resolve(file), self.catalog_options()),
            None => ServiceCatalog::builtin(self.catalog_options()),
        }
    }

    /// The machine inventory, empty when no file is configured.
    pub fn load_inventory(&self) -> anyhow::Result<InventoryFile> {
        match &self.inventory.file {
            Some(file) => InventoryFile::from_file(&self.resolve(file)),
            None => Ok(InventoryFile::default()),
        }
    }
}
