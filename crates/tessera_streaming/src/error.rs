//! Error types for the streaming engine.

use tessera_core::ConfigError;
use tessera_procedural::GenerationError;
use thiserror::Error;

/// World streaming errors.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Pipeline construction failed.
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// World configuration is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The worker thread could not be spawned.
    #[error("failed to spawn generation worker: {0}")]
    WorkerSpawn(String),

    /// `start` was called on a running worker.
    #[error("generation worker is already running")]
    WorkerAlreadyRunning,
}

/// Result type for streaming operations.
pub type WorldResult<T> = Result<T, WorldError>;
