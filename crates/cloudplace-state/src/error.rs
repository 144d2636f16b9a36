//! Error types for the assignment store.

use thiserror::Error;

/// Result type alias for assignment store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during assignment store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("machine not found: {0}")]
    MachineNotFound(String),

    #[error("service {service} is not assigned to machine {machine}")]
    AssignmentNotFound { machine: String, service: String },
}
