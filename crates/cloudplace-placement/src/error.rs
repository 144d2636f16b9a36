//! Placement engine error types.

use thiserror::Error;

/// Errors that can occur during placement operations.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("service not found in catalog: {0}")]
    ServiceNotFound(String),

    #[error("machine not found: {0}")]
    MachineNotFound(String),

    #[error("unknown placement stratum in document: {0}")]
    UnknownStratum(String),

    #[error("unsupported placement document version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("malformed placement document: {0}")]
    Malformed(String),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("assignment error: {0}")]
    State(#[from] cloudplace_state::StateError),
}

pub type PlacementResult<T> = Result<T, PlacementError>;
