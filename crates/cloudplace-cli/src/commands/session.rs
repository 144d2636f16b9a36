//! Opening a placement session from cloudplace.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;
use cloudplace_core::PlacementConfig;
use cloudplace_placement::{LoadReport, PlacementController};
use tracing::{info, warn};

/// A controller wired to the configured catalog, inventory and placements
/// file, with autosave on.
pub struct Session {
    pub config: PlacementConfig,
    pub controller: PlacementController,
    pub placements_path: PathBuf,
    /// Present when placements came from the file rather than defaults.
    pub loaded: Option<LoadReport>,
}

impl Session {
    pub fn open(config_path: &Path) -> anyhow::Result<Self> {
        let config = PlacementConfig::from_file_or_default(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let catalog = config.load_catalog().context("loading service catalog")?;
        let inventory = config.load_inventory().context("loading machine inventory")?;
        let placements_path = config.placements_path();

        info!(
            services = catalog.len(),
            machines = inventory.machines.len(),
            mode = ?config.placement.mode,
            "session opened"
        );

        let mut controller =
            PlacementController::new(catalog, inventory).with_mode(config.placement.mode);
        let loaded = controller
            .initialize(&placements_path)
            .with_context(|| format!("initializing from {}", placements_path.display()))?;

        if let Some(report) = &loaded {
            for skipped in &report.skipped {
                warn!(
                    machine = %skipped.machine,
                    service = %skipped.service,
                    reason = %skipped.reason,
                    "saved assignment dropped"
                );
            }
        }

        Ok(Self {
            config,
            controller,
            placements_path,
            loaded,
        })
    }

    /// Whether the user should review placement before deploying.
    pub fn review_needed(&self) -> bool {
        self.controller
            .needs_review(self.config.placement.edit_placement)
    }

    /// Flush to disk, surfacing errors autosave would only log.
    pub fn save(&self) -> anyhow::Result<()> {
        self.controller
            .save_file(&self.placements_path)
            .with_context(|| format!("writing {}", self.placements_path.display()))
    }
}
