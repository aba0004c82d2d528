//! # Core Error Types
//!
//! Configuration-time and lifecycle errors. Hot-path conditions (full world,
//! exhausted pools) are not errors: they degrade and log instead.

use thiserror::Error;

/// Errors that can occur in the simulation core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A system with the same name is already registered.
    #[error("duplicate system: {0}")]
    DuplicateSystem(String),

    /// No system with this name is registered.
    #[error("system not found: {0}")]
    SystemNotFound(String),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The bridge writer/reader roles are already handed out.
    #[error("transform bridge roles already taken")]
    BridgeRoleTaken,

    /// The worker has been terminated and accepts no more requests.
    #[error("worker unavailable")]
    WorkerUnavailable,

    /// The worker is starting, restarting or still running a step.
    #[error("worker busy")]
    WorkerBusy,

    /// The worker channel is disconnected.
    #[error("worker channel disconnected")]
    WorkerDisconnected,

    /// The worker reported a failure.
    #[error("worker failed: {0}")]
    WorkerFailed(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
