//! Error types for tree observation.

use thiserror::Error;

/// Errors reported by the observation layer.
///
/// Observation itself never fails at runtime. The start variants only
/// explain why a start request did not take effect.
#[derive(Debug, Error)]
pub enum Error {
    #[error("observer is already bound to this object")]
    AlreadyObserving,

    #[error("observer is bound to a different object")]
    ObjectMismatch,

    #[error("observer was stopped by a callback while starting")]
    StoppedWhileStarting,

    #[error("invalid observation config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for observation operations.
pub type Result<T> = std::result::Result<T, Error>;
