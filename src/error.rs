//! Error types for the pool supervisor.

use crate::worker::WorkerId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Startup configuration errors. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Worker registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Ids are allocated monotonically, so this signals a broken invariant.
    #[error("Worker {id} is already registered")]
    DuplicateId { id: WorkerId },

    #[error("Worker {id} not found")]
    NotFound { id: WorkerId },
}

/// Pool manager errors.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Pool is closed")]
    PoolClosed,

    #[error("Worker {id} panicked before it could be joined")]
    WorkerPanicked { id: WorkerId },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Malformed operator commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Please provide worker id")]
    MissingWorkerId,

    #[error("Unknown command.")]
    Unknown { name: String },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
